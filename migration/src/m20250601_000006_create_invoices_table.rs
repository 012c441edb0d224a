use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Invoices {
    Table,
    Id,
    ObligationType,
    ObligationId,
    Attempt,
    ProjectId,
    DeliveryId,
    PaymentId,
    PayerId,
    Amount,
    PlatformFee,
    TotalAmount,
    Status,
    DueDate,
    SnapToken,
    RedirectUrl,
    PaidAt,
    CreatedAt,
    UpdatedAt,
}

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
enum EcommercePayments {
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
                    .table(Invoices::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Invoices::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Invoices::ObligationType).string().not_null())
                    .col(ColumnDef::new(Invoices::ObligationId).uuid().not_null())
                    .col(ColumnDef::new(Invoices::Attempt).integer().not_null().default(1))
                    .col(ColumnDef::new(Invoices::ProjectId).uuid().null())
                    .col(ColumnDef::new(Invoices::DeliveryId).uuid().null())
                    .col(ColumnDef::new(Invoices::PaymentId).uuid().null())
                    .col(ColumnDef::new(Invoices::PayerId).uuid().not_null())
                    .col(ColumnDef::new(Invoices::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Invoices::PlatformFee).big_integer().not_null())
                    .col(ColumnDef::new(Invoices::TotalAmount).big_integer().not_null())
                    .col(ColumnDef::new(Invoices::Status).string().not_null())
                    .col(
                        ColumnDef::new(Invoices::DueDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Invoices::SnapToken).string().null())
                    .col(ColumnDef::new(Invoices::RedirectUrl).string().null())
                    .col(
                        ColumnDef::new(Invoices::PaidAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Invoices::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Invoices::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invoices_project_id")
                            .from(Invoices::Table, Invoices::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invoices_delivery_id")
                            .from(Invoices::Table, Invoices::DeliveryId)
                            .to(Deliveries::Table, Deliveries::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invoices_payment_id")
                            .from(Invoices::Table, Invoices::PaymentId)
                            .to(EcommercePayments::Table, EcommercePayments::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invoices_payer_id")
                            .from(Invoices::Table, Invoices::PayerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One invoice per obligation per attempt; a failed invoice is never reused.
        manager
            .create_index(
                Index::create()
                    .name("idx_invoices_obligation_unique")
                    .table(Invoices::Table)
                    .col(Invoices::ObligationType)
                    .col(Invoices::ObligationId)
                    .col(Invoices::Attempt)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // The sweeper scans pending invoices by due date.
        manager
            .create_index(
                Index::create()
                    .name("idx_invoices_status_due_date")
                    .table(Invoices::Table)
                    .col(Invoices::Status)
                    .col(Invoices::DueDate)
                    .to_owned(),
            )
            .await?;

        if manager.get_database_backend() == DatabaseBackend::Postgres {
            manager
                .get_connection()
                .execute_unprepared(
                    "ALTER TABLE invoices ADD CONSTRAINT chk_invoices_single_obligation CHECK (\
                     (CASE WHEN project_id IS NULL THEN 0 ELSE 1 END) + \
                     (CASE WHEN delivery_id IS NULL THEN 0 ELSE 1 END) + \
                     (CASE WHEN payment_id IS NULL THEN 0 ELSE 1 END) = 1)",
                )
                .await?;
            manager
                .get_connection()
                .execute_unprepared(
                    "ALTER TABLE invoices ADD CONSTRAINT chk_invoices_total CHECK (total_amount = amount + platform_fee)",
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Invoices::Table).to_owned())
            .await
    }
}
