use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Deliveries {
    Table,
    Id,
    FarmerId,
    DriverId,
    ContractId,
    TrackingCode,
    PickupAddress,
    PickupLat,
    PickupLng,
    DestinationAddress,
    DestinationLat,
    DestinationLng,
    ItemDescription,
    ItemWeight,
    Price,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deliveries::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Deliveries::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Deliveries::FarmerId).uuid().not_null())
                    .col(ColumnDef::new(Deliveries::DriverId).uuid().null())
                    // No FK: contracts reference deliveries, not the other way round.
                    .col(ColumnDef::new(Deliveries::ContractId).uuid().null())
                    .col(
                        ColumnDef::new(Deliveries::TrackingCode)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Deliveries::PickupAddress).string().not_null())
                    .col(ColumnDef::new(Deliveries::PickupLat).double().not_null())
                    .col(ColumnDef::new(Deliveries::PickupLng).double().not_null())
                    .col(ColumnDef::new(Deliveries::DestinationAddress).string().not_null())
                    .col(ColumnDef::new(Deliveries::DestinationLat).double().not_null())
                    .col(ColumnDef::new(Deliveries::DestinationLng).double().not_null())
                    .col(ColumnDef::new(Deliveries::ItemDescription).text().not_null())
                    .col(ColumnDef::new(Deliveries::ItemWeight).double().not_null())
                    .col(ColumnDef::new(Deliveries::Price).big_integer().not_null())
                    .col(ColumnDef::new(Deliveries::Status).string().not_null())
                    .col(
                        ColumnDef::new(Deliveries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Deliveries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deliveries_farmer_id")
                            .from(Deliveries::Table, Deliveries::FarmerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deliveries_driver_id")
                            .from(Deliveries::Table, Deliveries::DriverId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Deliveries::Table).to_owned())
            .await
    }
}
