use chrono::Utc;
use sea_orm::*;
use uuid::Uuid;

use crate::models::webhook_logs;

/// A callback as received, before any business logic runs.
#[derive(Debug, Clone, Default)]
pub struct NewWebhookLog {
    pub provider: String,
    pub order_id: String,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    pub signature_valid: bool,
    pub raw_body: String,
    pub headers: String,
    pub parsed_body: Option<String>,
    pub error: Option<String>,
}

/// Append a log row. Rows are never updated except to mark them processed or
/// to attach an error.
pub async fn insert_log<C: ConnectionTrait>(
    conn: &C,
    input: NewWebhookLog,
) -> Result<webhook_logs::Model, DbErr> {
    let log = webhook_logs::ActiveModel {
        id: Set(Uuid::new_v4()),
        provider: Set(input.provider),
        order_id: Set(input.order_id),
        transaction_status: Set(input.transaction_status),
        fraud_status: Set(input.fraud_status),
        status_code: Set(input.status_code),
        gross_amount: Set(input.gross_amount),
        signature_key: Set(input.signature_key),
        signature_valid: Set(input.signature_valid),
        processed: Set(false),
        raw_body: Set(input.raw_body),
        headers: Set(input.headers),
        parsed_body: Set(input.parsed_body),
        error: Set(input.error),
        created_at: Set(Utc::now()),
        processed_at: Set(None),
    };

    log.insert(conn).await
}

/// Whether an earlier callback for this order already applied a terminal transition.
pub async fn has_processed_log<C: ConnectionTrait>(
    conn: &C,
    provider: &str,
    order_id: &str,
) -> Result<bool, DbErr> {
    let count = webhook_logs::Entity::find()
        .filter(webhook_logs::Column::Provider.eq(provider))
        .filter(webhook_logs::Column::OrderId.eq(order_id))
        .filter(webhook_logs::Column::Processed.eq(true))
        .count(conn)
        .await?;
    Ok(count > 0)
}

pub async fn mark_processed<C: ConnectionTrait>(
    conn: &C,
    log: webhook_logs::Model,
) -> Result<webhook_logs::Model, DbErr> {
    let mut active: webhook_logs::ActiveModel = log.into();
    active.processed = Set(true);
    active.processed_at = Set(Some(Utc::now()));
    active.update(conn).await
}

pub async fn record_error<C: ConnectionTrait>(
    conn: &C,
    log: webhook_logs::Model,
    error: String,
) -> Result<webhook_logs::Model, DbErr> {
    let mut active: webhook_logs::ActiveModel = log.into();
    active.error = Set(Some(error));
    active.update(conn).await
}

pub async fn get_logs_for_order<C: ConnectionTrait>(
    conn: &C,
    order_id: &str,
) -> Result<Vec<webhook_logs::Model>, DbErr> {
    webhook_logs::Entity::find()
        .filter(webhook_logs::Column::OrderId.eq(order_id))
        .order_by_asc(webhook_logs::Column::CreatedAt)
        .all(conn)
        .await
}
