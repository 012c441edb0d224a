//! Payout Ledger: outbound obligations created at payment time and closed by
//! an admin after the manual transfer.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use tracing::info;
use uuid::Uuid;

use crate::auth::authorization::require_admin;
use crate::db::{
    commerce as commerce_db, deliveries as delivery_db, invoices as invoice_db,
    ledger as ledger_db, projects as project_db, users as user_db,
};
use crate::error::{CoreError, CoreResult};
use crate::models::invoices::{self, ObligationType};
use crate::models::payouts::{self, PayeeType, PendingPayout};
use crate::models::users::{self, BankInfo};

/// Absolute http(s) URL with a host.
fn validate_proof_url(url: &str) -> CoreResult<()> {
    let invalid =
        || CoreError::InvalidInput("proof_url must be an absolute http(s) URL".to_string());
    let parsed = reqwest::Url::parse(url).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host().is_none() {
        return Err(invalid());
    }
    Ok(())
}

/// Project title, delivery description or the seller's order numbers.
async fn describe_context<C: ConnectionTrait>(
    conn: &C,
    invoice: &invoices::Model,
    payout: &payouts::Model,
) -> CoreResult<String> {
    let context = match invoice.obligation_type {
        ObligationType::Project => project_db::get_project_by_id(conn, invoice.obligation_id)
            .await?
            .map(|p| p.title),
        ObligationType::Delivery => delivery_db::get_delivery_by_id(conn, invoice.obligation_id)
            .await?
            .map(|d| d.item_description),
        ObligationType::Ecommerce => {
            let numbers: Vec<String> =
                commerce_db::get_orders_for_payment(conn, invoice.obligation_id)
                    .await?
                    .into_iter()
                    .filter(|o| payout.payee_type == PayeeType::Seller && o.seller_id == payout.payee_id)
                    .map(|o| o.invoice_number)
                    .collect();
            (!numbers.is_empty()).then(|| numbers.join(", "))
        }
    };
    Ok(context.unwrap_or_default())
}

/// Every payout awaiting disbursement, with payee bank details and context.
pub async fn list_pending(db: &DatabaseConnection) -> CoreResult<Vec<PendingPayout>> {
    let pending = ledger_db::get_pending_payouts(db).await?;
    let payees = user_db::get_users_by_ids(db, pending.iter().map(|p| p.payee_id)).await?;

    let mut invoices_by_tx: HashMap<Uuid, invoices::Model> = HashMap::new();
    let mut result = Vec::with_capacity(pending.len());

    for payout in pending {
        if !invoices_by_tx.contains_key(&payout.transaction_id) {
            let transaction = ledger_db::get_transaction_by_id(db, payout.transaction_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Transaction", payout.transaction_id))?;
            let invoice = invoice_db::get_invoice_by_id(db, transaction.invoice_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Invoice", transaction.invoice_id))?;
            invoices_by_tx.insert(payout.transaction_id, invoice);
        }
        let context = match invoices_by_tx.get(&payout.transaction_id) {
            Some(invoice) => describe_context(db, invoice, &payout).await?,
            None => String::new(),
        };

        let payee = payees.get(&payout.payee_id);
        result.push(PendingPayout {
            payee_name: payee.map(|u| u.name.clone()).unwrap_or_default(),
            bank: payee.map(BankInfo::from).unwrap_or(BankInfo {
                bank_name: None,
                account_number: None,
                account_name: None,
            }),
            context,
            payout,
        });
    }

    Ok(result)
}

/// Close a payout and release escrow once its transaction has nothing left
/// pending.
async fn finalize(
    db: &DatabaseConnection,
    payout_id: Uuid,
    admin: &users::Model,
    status: payouts::Status,
    proof_url: Option<String>,
    failure_reason: Option<String>,
) -> CoreResult<payouts::Model> {
    require_admin(admin)?;

    let txn = db.begin().await?;

    let payout = ledger_db::lock_payout(&txn, payout_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Payout", payout_id))?;
    if payout.status != payouts::Status::PendingDisbursement {
        return Err(CoreError::IllegalState(format!(
            "Payout {payout_id} was already finalized"
        )));
    }

    let payout =
        ledger_db::finalize_payout(&txn, payout, status, admin.id, proof_url, failure_reason)
            .await?;

    if ledger_db::count_pending_payouts(&txn, payout.transaction_id).await? == 0 {
        let transaction = ledger_db::lock_transaction(&txn, payout.transaction_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Transaction", payout.transaction_id))?;
        if transaction.released_at.is_none() {
            let transaction = ledger_db::mark_released(&txn, transaction, Utc::now()).await?;
            info!(transaction_id = %transaction.id, "Escrow released");
        }
    }

    txn.commit().await?;

    info!(
        payout_id = %payout.id,
        status = ?payout.status,
        admin_id = %admin.id,
        "Payout finalized"
    );
    Ok(payout)
}

pub async fn mark_completed(
    db: &DatabaseConnection,
    payout_id: Uuid,
    admin: &users::Model,
    proof_url: String,
) -> CoreResult<payouts::Model> {
    require_admin(admin)?;
    let proof_url = proof_url.trim().to_string();
    validate_proof_url(&proof_url)?;
    finalize(
        db,
        payout_id,
        admin,
        payouts::Status::Completed,
        Some(proof_url),
        None,
    )
    .await
}

pub async fn mark_failed(
    db: &DatabaseConnection,
    payout_id: Uuid,
    admin: &users::Model,
    reason: String,
) -> CoreResult<payouts::Model> {
    require_admin(admin)?;
    let reason = reason.trim().to_string();
    if reason.is_empty() {
        return Err(CoreError::InvalidInput(
            "A failure reason is required".to_string(),
        ));
    }
    finalize(db, payout_id, admin, payouts::Status::Failed, None, Some(reason)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_url_must_be_absolute_http() {
        assert!(validate_proof_url("https://cdn.example.com/p1.jpg").is_ok());
        assert!(validate_proof_url("http://localhost:8080/uploads/p1.jpg").is_ok());
        assert!(validate_proof_url("ftp://example.com/p1.jpg").is_err());
        assert!(validate_proof_url("/uploads/p1.jpg").is_err());
        assert!(validate_proof_url("https://").is_err());
        assert!(validate_proof_url("https://?").is_err());
        assert!(validate_proof_url("https://:").is_err());
        assert!(validate_proof_url("http://#frag").is_err());
        assert!(validate_proof_url("mailto:admin@example.com").is_err());
        assert!(validate_proof_url("https://cdn example.com/p1.jpg").is_err());
    }
}
