use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    InvoiceId,
    AmountPaid,
    PaymentMethod,
    PaymentGatewayReference,
    TransactionDate,
    ReleasedAt,
}

#[derive(DeriveIden)]
enum Payouts {
    Table,
    Id,
    TransactionId,
    PayeeId,
    PayeeType,
    Amount,
    Status,
    ReleasedAt,
    TransferProofUrl,
    FailureReason,
    ProcessedBy,
    ProcessedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PlatformProfits {
    Table,
    Id,
    TransactionId,
    Source,
    Amount,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Invoices {
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
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Transactions::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Transactions::InvoiceId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Transactions::AmountPaid).big_integer().not_null())
                    .col(ColumnDef::new(Transactions::PaymentMethod).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::PaymentGatewayReference)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::TransactionDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::ReleasedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_invoice_id")
                            .from(Transactions::Table, Transactions::InvoiceId)
                            .to(Invoices::Table, Invoices::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payouts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Payouts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Payouts::TransactionId).uuid().not_null())
                    .col(ColumnDef::new(Payouts::PayeeId).uuid().not_null())
                    .col(ColumnDef::new(Payouts::PayeeType).string().not_null())
                    .col(ColumnDef::new(Payouts::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Payouts::Status).string().not_null())
                    .col(
                        ColumnDef::new(Payouts::ReleasedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Payouts::TransferProofUrl).string().null())
                    .col(ColumnDef::new(Payouts::FailureReason).text().null())
                    .col(ColumnDef::new(Payouts::ProcessedBy).uuid().null())
                    .col(
                        ColumnDef::new(Payouts::ProcessedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Payouts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payouts_transaction_id")
                            .from(Payouts::Table, Payouts::TransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payouts_payee_id")
                            .from(Payouts::Table, Payouts::PayeeId)
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
                    .table(PlatformProfits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlatformProfits::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PlatformProfits::TransactionId).uuid().not_null())
                    .col(ColumnDef::new(PlatformProfits::Source).string().not_null())
                    .col(ColumnDef::new(PlatformProfits::Amount).big_integer().not_null())
                    .col(
                        ColumnDef::new(PlatformProfits::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_platform_profits_transaction_id")
                            .from(PlatformProfits::Table, PlatformProfits::TransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PlatformProfits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payouts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}
