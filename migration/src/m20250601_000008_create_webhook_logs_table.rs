use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum WebhookLogs {
    Table,
    Id,
    Provider,
    OrderId,
    TransactionStatus,
    FraudStatus,
    StatusCode,
    GrossAmount,
    SignatureKey,
    SignatureValid,
    Processed,
    RawBody,
    Headers,
    ParsedBody,
    Error,
    CreatedAt,
    ProcessedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WebhookLogs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(WebhookLogs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(WebhookLogs::Provider).string().not_null())
                    .col(ColumnDef::new(WebhookLogs::OrderId).string().not_null())
                    .col(ColumnDef::new(WebhookLogs::TransactionStatus).string().not_null())
                    .col(ColumnDef::new(WebhookLogs::FraudStatus).string().null())
                    .col(ColumnDef::new(WebhookLogs::StatusCode).string().not_null())
                    .col(ColumnDef::new(WebhookLogs::GrossAmount).string().not_null())
                    .col(ColumnDef::new(WebhookLogs::SignatureKey).string().not_null())
                    .col(
                        ColumnDef::new(WebhookLogs::SignatureValid)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(WebhookLogs::Processed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(WebhookLogs::RawBody).text().not_null())
                    .col(ColumnDef::new(WebhookLogs::Headers).text().not_null())
                    .col(ColumnDef::new(WebhookLogs::ParsedBody).text().null())
                    .col(ColumnDef::new(WebhookLogs::Error).text().null())
                    .col(
                        ColumnDef::new(WebhookLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WebhookLogs::ProcessedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Lookup index for idempotency probes. Not unique: replays are kept.
        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_logs_probe")
                    .table(WebhookLogs::Table)
                    .col(WebhookLogs::Provider)
                    .col(WebhookLogs::OrderId)
                    .col(WebhookLogs::TransactionStatus)
                    .col(WebhookLogs::SignatureKey)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WebhookLogs::Table).to_owned())
            .await
    }
}
