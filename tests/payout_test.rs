//! Payout ledger: admin disbursement and escrow release.
//!
//! Run with: `cargo test --test payout_test`
mod common;

use agrimarket_backend::db::ledger as ledger_db;
use agrimarket_backend::error::CoreError;
use agrimarket_backend::models::payouts;
use agrimarket_backend::models::project_applications::CreateApplication;
use agrimarket_backend::models::transactions;
use agrimarket_backend::models::users::{self, Roles};
use agrimarket_backend::services::payments::WebhookAck;
use agrimarket_backend::services::{board, payouts as payout_service};
use common::{engines, harvest_project, seed_user, settlement_for, setup_db};
use sea_orm::DatabaseConnection;

/// A paid two-worker project; returns the admin, its transaction and payouts.
async fn paid_project(
    db: &DatabaseConnection,
) -> (users::Model, transactions::Model, Vec<payouts::Model>) {
    let e = engines();
    let admin = seed_user(db, "Admin", Roles::Admin).await;
    let farmer = seed_user(db, "Farmer", Roles::Farmer).await;
    let project = board::create_project(db, farmer.id, harvest_project(2)).await.unwrap();

    let mut invoice = None;
    for name in ["Asep", "Dewi"] {
        let worker = seed_user(db, name, Roles::Worker).await;
        let application = board::apply(
            db,
            project.id,
            worker.id,
            CreateApplication {
                message: String::new(),
            },
        )
        .await
        .unwrap();
        invoice = e
            .contracts
            .accept_application(db, application.id, farmer.id)
            .await
            .unwrap()
            .invoice;
    }
    let invoice = invoice.unwrap();

    let ack = e
        .payments
        .handle_webhook(db, &settlement_for(&invoice), "{}".to_string())
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Paid);

    let transaction = ledger_db::get_transaction_by_invoice(db, invoice.id)
        .await
        .unwrap()
        .unwrap();
    let payouts = ledger_db::get_payouts_by_transaction(db, transaction.id).await.unwrap();
    (admin, transaction, payouts)
}

async fn transaction(db: &DatabaseConnection, id: uuid::Uuid) -> transactions::Model {
    ledger_db::get_transaction_by_id(db, id).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_pending_payouts_carry_payee_and_context() {
    let db = setup_db().await;
    let (_, _, payouts) = paid_project(&db).await;

    let pending = payout_service::list_pending(&db).await.unwrap();
    assert_eq!(pending.len(), payouts.len());
    for p in &pending {
        assert!(["Asep", "Dewi"].contains(&p.payee_name.as_str()));
        assert_eq!(p.context, "Rice harvest");
        assert!(p.bank.bank_name.is_none());
    }
}

#[tokio::test]
async fn test_escrow_is_released_when_the_last_payout_closes() {
    let db = setup_db().await;
    let (admin, tx, payouts) = paid_project(&db).await;

    let first = payout_service::mark_completed(
        &db,
        payouts[0].id,
        &admin,
        "https://cdn.agri.test/proofs/transfer-1.jpg".to_string(),
    )
    .await
    .unwrap();
    assert_eq!(first.status, payouts::Status::Completed);
    assert_eq!(first.processed_by, Some(admin.id));
    assert!(first.processed_at.is_some());
    assert!(transaction(&db, tx.id).await.released_at.is_none());

    let second = payout_service::mark_failed(
        &db,
        payouts[1].id,
        &admin,
        "  Account closed  ".to_string(),
    )
    .await
    .unwrap();
    assert_eq!(second.status, payouts::Status::Failed);
    assert_eq!(second.failure_reason.as_deref(), Some("Account closed"));
    assert!(transaction(&db, tx.id).await.released_at.is_some());

    assert!(payout_service::list_pending(&db).await.unwrap().is_empty());

    assert!(matches!(
        payout_service::mark_completed(
            &db,
            payouts[0].id,
            &admin,
            "https://cdn.agri.test/proofs/again.jpg".to_string(),
        )
        .await,
        Err(CoreError::IllegalState(_))
    ));
}

#[tokio::test]
async fn test_only_admins_finalize_with_valid_evidence() {
    let db = setup_db().await;
    let (admin, _, payouts) = paid_project(&db).await;
    let farmer = seed_user(&db, "NotAdmin", Roles::Farmer).await;

    assert!(matches!(
        payout_service::mark_completed(
            &db,
            payouts[0].id,
            &farmer,
            "https://cdn.agri.test/p.jpg".to_string(),
        )
        .await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(
        payout_service::mark_completed(&db, payouts[0].id, &admin, "/uploads/p.jpg".to_string())
            .await,
        Err(CoreError::InvalidInput(_))
    ));
    assert!(matches!(
        payout_service::mark_failed(&db, payouts[0].id, &admin, "   ".to_string()).await,
        Err(CoreError::InvalidInput(_))
    ));
    assert!(matches!(
        payout_service::mark_failed(&db, uuid::Uuid::new_v4(), &admin, "Bounced".to_string())
            .await,
        Err(CoreError::NotFound(_))
    ));

    let pending = payout_service::list_pending(&db).await.unwrap();
    assert_eq!(pending.len(), 2);
}
