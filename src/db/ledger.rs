use chrono::{DateTime, Utc};
use sea_orm::*;
use uuid::Uuid;

use crate::models::invoices::ObligationType;
use crate::models::payouts::{self, PayeeType};
use crate::models::{platform_profits, transactions};
use crate::money::Money;

// ── Transactions ──

pub async fn insert_transaction<C: ConnectionTrait>(
    conn: &C,
    invoice_id: Uuid,
    amount_paid: Money,
    payment_method: String,
    reference: String,
    transaction_date: DateTime<Utc>,
) -> Result<transactions::Model, DbErr> {
    let transaction = transactions::ActiveModel {
        id: Set(Uuid::new_v4()),
        invoice_id: Set(invoice_id),
        amount_paid: Set(amount_paid),
        payment_method: Set(payment_method),
        payment_gateway_reference: Set(reference),
        transaction_date: Set(transaction_date),
        released_at: Set(None),
    };

    transaction.insert(conn).await
}

pub async fn get_transaction_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<transactions::Model>, DbErr> {
    transactions::Entity::find_by_id(id).one(conn).await
}

pub async fn get_transaction_by_invoice<C: ConnectionTrait>(
    conn: &C,
    invoice_id: Uuid,
) -> Result<Option<transactions::Model>, DbErr> {
    transactions::Entity::find()
        .filter(transactions::Column::InvoiceId.eq(invoice_id))
        .one(conn)
        .await
}

pub async fn lock_transaction<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<transactions::Model>, DbErr> {
    transactions::Entity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
}

/// Stamp the moment escrow was released.
pub async fn mark_released<C: ConnectionTrait>(
    conn: &C,
    transaction: transactions::Model,
    released_at: DateTime<Utc>,
) -> Result<transactions::Model, DbErr> {
    let mut active: transactions::ActiveModel = transaction.into();
    active.released_at = Set(Some(released_at));
    active.update(conn).await
}

// ── Payouts ──

pub async fn insert_payout<C: ConnectionTrait>(
    conn: &C,
    transaction_id: Uuid,
    payee_id: Uuid,
    payee_type: PayeeType,
    amount: Money,
    now: DateTime<Utc>,
) -> Result<payouts::Model, DbErr> {
    let payout = payouts::ActiveModel {
        id: Set(Uuid::new_v4()),
        transaction_id: Set(transaction_id),
        payee_id: Set(payee_id),
        payee_type: Set(payee_type),
        amount: Set(amount),
        status: Set(payouts::Status::PendingDisbursement),
        released_at: Set(now),
        transfer_proof_url: Set(None),
        failure_reason: Set(None),
        processed_by: Set(None),
        processed_at: Set(None),
        created_at: Set(now),
    };

    payout.insert(conn).await
}

pub async fn lock_payout<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<payouts::Model>, DbErr> {
    payouts::Entity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
}

pub async fn get_payouts_by_transaction<C: ConnectionTrait>(
    conn: &C,
    transaction_id: Uuid,
) -> Result<Vec<payouts::Model>, DbErr> {
    payouts::Entity::find()
        .filter(payouts::Column::TransactionId.eq(transaction_id))
        .order_by_asc(payouts::Column::CreatedAt)
        .all(conn)
        .await
}

pub async fn count_pending_payouts<C: ConnectionTrait>(
    conn: &C,
    transaction_id: Uuid,
) -> Result<u64, DbErr> {
    payouts::Entity::find()
        .filter(payouts::Column::TransactionId.eq(transaction_id))
        .filter(payouts::Column::Status.eq(payouts::Status::PendingDisbursement))
        .count(conn)
        .await
}

/// All payouts awaiting a manual transfer, oldest first.
pub async fn get_pending_payouts<C: ConnectionTrait>(
    conn: &C,
) -> Result<Vec<payouts::Model>, DbErr> {
    payouts::Entity::find()
        .filter(payouts::Column::Status.eq(payouts::Status::PendingDisbursement))
        .order_by_asc(payouts::Column::CreatedAt)
        .all(conn)
        .await
}

/// Close a payout: `completed` with a proof URL, or `failed` with a reason.
pub async fn finalize_payout<C: ConnectionTrait>(
    conn: &C,
    payout: payouts::Model,
    status: payouts::Status,
    admin_id: Uuid,
    proof_url: Option<String>,
    failure_reason: Option<String>,
) -> Result<payouts::Model, DbErr> {
    let mut active: payouts::ActiveModel = payout.into();
    active.status = Set(status);
    active.transfer_proof_url = Set(proof_url);
    active.failure_reason = Set(failure_reason);
    active.processed_by = Set(Some(admin_id));
    active.processed_at = Set(Some(Utc::now()));
    active.update(conn).await
}

// ── Platform profits ──

pub async fn insert_platform_profit<C: ConnectionTrait>(
    conn: &C,
    transaction_id: Uuid,
    source: ObligationType,
    amount: Money,
) -> Result<platform_profits::Model, DbErr> {
    let profit = platform_profits::ActiveModel {
        id: Set(Uuid::new_v4()),
        transaction_id: Set(transaction_id),
        source: Set(source),
        amount: Set(amount),
        created_at: Set(Utc::now()),
    };

    profit.insert(conn).await
}

pub async fn get_platform_profit_by_transaction<C: ConnectionTrait>(
    conn: &C,
    transaction_id: Uuid,
) -> Result<Option<platform_profits::Model>, DbErr> {
    platform_profits::Entity::find()
        .filter(platform_profits::Column::TransactionId.eq(transaction_id))
        .one(conn)
        .await
}
