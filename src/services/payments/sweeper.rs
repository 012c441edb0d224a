//! Invoice timeout sweeper, the one background task of the core.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use super::settlement;
use crate::db::{commerce as commerce_db, invoices as invoice_db};
use crate::error::CoreResult;
use crate::models::invoices::{self, ObligationType};
use crate::models::ecommerce_payments;

/// Fail every pending invoice whose due date lies strictly before `now`.
/// Returns the ids that were transitioned; an invoice that fails to expire
/// is logged and left for the next tick.
pub async fn expire_overdue(db: &DatabaseConnection, now: DateTime<Utc>) -> CoreResult<Vec<Uuid>> {
    let candidates = invoice_db::list_overdue_invoice_ids(db, now).await?;
    let mut expired = Vec::with_capacity(candidates.len());

    for invoice_id in candidates {
        match expire_one(db, invoice_id, now).await {
            Ok(true) => expired.push(invoice_id),
            Ok(false) => {}
            Err(e) => error!(invoice_id = %invoice_id, error = %e, "Failed to expire invoice"),
        }
    }

    if !expired.is_empty() {
        info!(count = expired.len(), "Expired overdue invoices");
    }
    Ok(expired)
}

async fn expire_one(db: &DatabaseConnection, invoice_id: Uuid, now: DateTime<Utc>) -> CoreResult<bool> {
    let Some(peek) = invoice_db::get_invoice_by_id(db, invoice_id).await? else {
        return Ok(false);
    };

    let txn = db.begin().await?;

    // Same lock order as the webhook: payment before its invoice.
    let payment = if peek.obligation_type == ObligationType::Ecommerce {
        commerce_db::lock_payment(&txn, peek.obligation_id).await?
    } else {
        None
    };

    let Some(invoice) = invoice_db::lock_invoice(&txn, invoice_id).await? else {
        return Ok(false);
    };
    if invoice.status != invoices::Status::Pending || invoice.due_date >= now {
        return Ok(false);
    }

    match payment {
        Some(payment) if payment.status == ecommerce_payments::Status::Pending => {
            settlement::fail_payment(&txn, payment, Some(invoice)).await?;
        }
        _ => {
            settlement::fail_invoice(&txn, invoice).await?;
        }
    }

    txn.commit().await?;
    info!(invoice_id = %invoice_id, due_date = %peek.due_date, "Invoice expired");
    Ok(true)
}

/// Run [`expire_overdue`] every `interval` until the runtime shuts down.
pub fn spawn_sweeper(db: DatabaseConnection, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "Invoice sweeper started");

        loop {
            ticker.tick().await;
            if let Err(e) = expire_overdue(&db, Utc::now()).await {
                error!(error = %e, "Invoice sweep failed");
            }
        }
    })
}
