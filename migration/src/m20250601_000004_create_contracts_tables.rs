use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Identifiers for the `contracts` table and its columns.
#[derive(DeriveIden)]
enum Contracts {
    Table,
    Id,
    ContractType,
    ProjectId,
    DeliveryId,
    FarmerId,
    WorkerId,
    DriverId,
    SignedByFarmer,
    SignedBySecondParty,
    SignedAt,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProjectAssignments {
    Table,
    Id,
    ProjectId,
    WorkerId,
    ContractId,
    AgreedRate,
    Status,
    CreatedAt,
    UpdatedAt,
}

/// Re-declare parent table identifiers for foreign-key references.
#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Deliveries {
    Table,
    Id,
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
                    .table(Contracts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Contracts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Contracts::ContractType).string().not_null())
                    .col(ColumnDef::new(Contracts::ProjectId).uuid().null())
                    .col(ColumnDef::new(Contracts::DeliveryId).uuid().null())
                    .col(ColumnDef::new(Contracts::FarmerId).uuid().not_null())
                    .col(ColumnDef::new(Contracts::WorkerId).uuid().null())
                    .col(ColumnDef::new(Contracts::DriverId).uuid().null())
                    .col(
                        ColumnDef::new(Contracts::SignedByFarmer)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Contracts::SignedBySecondParty)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Contracts::SignedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Contracts::Status).string().not_null())
                    .col(
                        ColumnDef::new(Contracts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Contracts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contracts_project_id")
                            .from(Contracts::Table, Contracts::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contracts_delivery_id")
                            .from(Contracts::Table, Contracts::DeliveryId)
                            .to(Deliveries::Table, Deliveries::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contracts_farmer_id")
                            .from(Contracts::Table, Contracts::FarmerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProjectAssignments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProjectAssignments::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProjectAssignments::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(ProjectAssignments::WorkerId).uuid().not_null())
                    .col(ColumnDef::new(ProjectAssignments::ContractId).uuid().not_null())
                    .col(
                        ColumnDef::new(ProjectAssignments::AgreedRate)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProjectAssignments::Status).string().not_null())
                    .col(
                        ColumnDef::new(ProjectAssignments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProjectAssignments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_assignments_project_id")
                            .from(ProjectAssignments::Table, ProjectAssignments::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_assignments_worker_id")
                            .from(ProjectAssignments::Table, ProjectAssignments::WorkerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_assignments_contract_id")
                            .from(ProjectAssignments::Table, ProjectAssignments::ContractId)
                            .to(Contracts::Table, Contracts::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        if manager.get_database_backend() == DatabaseBackend::Postgres {
            // Exactly one of project/delivery, and the matching second party.
            manager
                .get_connection()
                .execute_unprepared(
                    "ALTER TABLE contracts ADD CONSTRAINT chk_contracts_single_subject CHECK (\
                     (contract_type = 'work' AND project_id IS NOT NULL AND delivery_id IS NULL AND driver_id IS NULL) OR \
                     (contract_type = 'delivery' AND delivery_id IS NOT NULL AND project_id IS NULL AND worker_id IS NULL))",
                )
                .await?;
            manager
                .get_connection()
                .execute_unprepared(
                    "ALTER TABLE contracts ADD CONSTRAINT chk_contracts_active_signed CHECK (\
                     status <> 'active' OR (signed_by_farmer AND signed_by_second_party))",
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectAssignments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Contracts::Table).to_owned())
            .await
    }
}
