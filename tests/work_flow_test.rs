//! Work projects end to end: hiring, invoicing, webhook settlement, completion.
//!
//! Run with: `cargo test --test work_flow_test`
mod common;

use agrimarket_backend::db::{
    invoices as invoice_db, ledger as ledger_db, projects as project_db,
    webhook_logs as log_db,
};
use agrimarket_backend::error::CoreError;
use agrimarket_backend::models::invoices::{self, Obligation};
use agrimarket_backend::models::payouts::{self, PayeeType};
use agrimarket_backend::models::project_applications::{self as applications, CreateApplication};
use agrimarket_backend::models::project_assignments as assignments;
use agrimarket_backend::models::projects::{self, DirectOffer, PaymentType};
use agrimarket_backend::models::users::{self, Roles};
use agrimarket_backend::models::contracts;
use agrimarket_backend::money::Money;
use agrimarket_backend::services::contracts::{AcceptedApplication, WORKER_BUSY};
use agrimarket_backend::services::payments::WebhookAck;
use agrimarket_backend::services::{board, lifecycle};
use common::{Engines, engines, harvest_project, seed_user, settlement_for, setup_db, signed_callback};
use sea_orm::DatabaseConnection;

struct Staffed {
    farmer: users::Model,
    workers: Vec<users::Model>,
    project: projects::Model,
    accepted: Vec<AcceptedApplication>,
    invoice: invoices::Model,
}

/// Post a project for `n` workers and accept one application per worker.
async fn staffed_project(db: &DatabaseConnection, e: &Engines, n: usize) -> Staffed {
    let farmer = seed_user(db, "Farmer", Roles::Farmer).await;
    let project = board::create_project(db, farmer.id, harvest_project(n as i32))
        .await
        .unwrap();

    let mut workers = Vec::new();
    let mut accepted = Vec::new();
    for i in 0..n {
        let worker = seed_user(db, &format!("Worker{i}"), Roles::Worker).await;
        let application = board::apply(
            db,
            project.id,
            worker.id,
            CreateApplication {
                message: "I have a sickle".to_string(),
            },
        )
        .await
        .unwrap();
        accepted.push(
            e.contracts
                .accept_application(db, application.id, farmer.id)
                .await
                .unwrap(),
        );
        workers.push(worker);
    }

    let invoice = accepted
        .last()
        .and_then(|a| a.invoice.clone())
        .expect("last acceptance should issue the invoice");
    let project = project_db::get_project_by_id(db, project.id)
        .await
        .unwrap()
        .unwrap();

    Staffed {
        farmer,
        workers,
        project,
        accepted,
        invoice,
    }
}

#[tokio::test]
async fn test_full_staffing_issues_invoice_with_platform_fee() {
    let db = setup_db().await;
    let e = engines();
    let s = staffed_project(&db, &e, 2).await;

    assert!(s.accepted[0].invoice.is_none());
    assert_eq!(s.project.status, projects::Status::WaitingPayment);
    assert_eq!(s.invoice.amount, Money::from_major(600_000));
    assert_eq!(s.invoice.platform_fee, Money::from_major(30_000));
    assert_eq!(s.invoice.total_amount, Money::from_major(630_000));
    assert_eq!(s.invoice.status, invoices::Status::Pending);
    assert_eq!(s.invoice.payer_id, s.farmer.id);
    assert_eq!(s.invoice.attempt, 1);
    assert_eq!(s.invoice.due_date.timestamp_subsec_nanos(), 0);

    for a in &s.accepted {
        assert_eq!(a.contract.status, contracts::Status::PendingSignature);
        assert_eq!(a.assignment.status, assignments::Status::Assigned);
        assert_eq!(a.application.status, applications::Status::Accepted);
    }
}

#[tokio::test]
async fn test_paid_webhook_opens_escrow_and_completion_closes_project() {
    let db = setup_db().await;
    let e = engines();
    let s = staffed_project(&db, &e, 2).await;

    for (a, worker) in s.accepted.iter().zip(&s.workers) {
        let signed = e.contracts.sign(&db, a.contract.id, worker.id).await.unwrap();
        assert_eq!(signed.contract.status, contracts::Status::Active);
        assert!(signed.invoice.is_none());
    }

    let initiated = e.payments.initiate(&db, s.invoice.id, &s.farmer).await.unwrap();
    assert_eq!(initiated.snap_token, format!("snap-{}", s.invoice.id));
    assert_eq!(initiated.amount, Money::from_major(630_000));

    let ack = e
        .payments
        .handle_webhook(&db, &settlement_for(&s.invoice), "{}".to_string())
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Paid);

    let invoice = invoice_db::get_invoice_by_id(&db, s.invoice.id).await.unwrap().unwrap();
    assert_eq!(invoice.status, invoices::Status::Paid);
    assert!(invoice.paid_at.is_some());

    let project = project_db::get_project_by_id(&db, s.project.id).await.unwrap().unwrap();
    assert_eq!(project.status, projects::Status::InProgress);

    let transaction = ledger_db::get_transaction_by_invoice(&db, invoice.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transaction.amount_paid, Money::from_major(630_000));
    assert_eq!(transaction.payment_method, "bank_transfer");
    assert_eq!(transaction.payment_gateway_reference, format!("tx-{}", invoice.id));
    assert!(transaction.released_at.is_none());

    let payouts = ledger_db::get_payouts_by_transaction(&db, transaction.id).await.unwrap();
    assert_eq!(payouts.len(), 2);
    for payout in &payouts {
        assert_eq!(payout.amount, Money::from_major(300_000));
        assert_eq!(payout.payee_type, PayeeType::Worker);
        assert_eq!(payout.status, payouts::Status::PendingDisbursement);
        assert!(s.workers.iter().any(|w| w.id == payout.payee_id));
    }

    let profit = ledger_db::get_platform_profit_by_transaction(&db, transaction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profit.amount, Money::from_major(30_000));

    let logs = log_db::get_logs_for_order(&db, &invoice.id.to_string()).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].signature_valid);
    assert!(logs[0].processed);

    let (_, project) = lifecycle::complete_assignment(&db, s.accepted[0].assignment.id, s.farmer.id)
        .await
        .unwrap();
    assert_eq!(project.status, projects::Status::InProgress);

    let (assignment, project) =
        lifecycle::complete_assignment(&db, s.accepted[1].assignment.id, s.farmer.id)
            .await
            .unwrap();
    assert_eq!(assignment.status, assignments::Status::Completed);
    assert_eq!(project.status, projects::Status::Completed);

    let details = e.contracts.list_contracts(&db, s.farmer.id).await.unwrap();
    assert_eq!(details.len(), 2);
    assert!(details.iter().all(|d| d.contract.status == contracts::Status::Completed));
}

#[tokio::test]
async fn test_replayed_webhook_is_acknowledged_once() {
    let db = setup_db().await;
    let e = engines();
    let s = staffed_project(&db, &e, 2).await;
    let body = settlement_for(&s.invoice);

    let first = e.payments.handle_webhook(&db, &body, "{}".to_string()).await.unwrap();
    let second = e.payments.handle_webhook(&db, &body, "{}".to_string()).await.unwrap();
    assert_eq!(first, WebhookAck::Paid);
    assert_eq!(second, WebhookAck::Duplicate);

    let logs = log_db::get_logs_for_order(&db, &s.invoice.id.to_string()).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs.iter().filter(|l| l.processed).count(), 1);

    let transaction = ledger_db::get_transaction_by_invoice(&db, s.invoice.id)
        .await
        .unwrap()
        .unwrap();
    let payouts = ledger_db::get_payouts_by_transaction(&db, transaction.id).await.unwrap();
    assert_eq!(payouts.len(), 2);
}

#[tokio::test]
async fn test_bad_signature_is_logged_and_rejected() {
    let db = setup_db().await;
    let e = engines();
    let s = staffed_project(&db, &e, 1).await;

    let mut body: serde_json::Value = serde_json::from_str(&settlement_for(&s.invoice)).unwrap();
    body["signature_key"] = serde_json::Value::String("0".repeat(128));

    let result = e
        .payments
        .handle_webhook(&db, &body.to_string(), "{}".to_string())
        .await;
    assert!(matches!(result, Err(CoreError::Unauthorized(_))));

    let invoice = invoice_db::get_invoice_by_id(&db, s.invoice.id).await.unwrap().unwrap();
    assert_eq!(invoice.status, invoices::Status::Pending);
    assert!(ledger_db::get_transaction_by_invoice(&db, invoice.id).await.unwrap().is_none());

    let logs = log_db::get_logs_for_order(&db, &invoice.id.to_string()).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].signature_valid);
    assert!(!logs[0].processed);
}

#[tokio::test]
async fn test_gross_amount_mismatch_is_rejected_without_transition() {
    let db = setup_db().await;
    let e = engines();
    let s = staffed_project(&db, &e, 1).await;

    // Signed correctly, but one rupiah short.
    let short = common::gross(s.invoice.total_amount - Money::from_major(1));
    let body = signed_callback(&s.invoice.id.to_string(), "settlement", &short);

    let ack = e.payments.handle_webhook(&db, &body, "{}".to_string()).await.unwrap();
    assert_eq!(ack, WebhookAck::Rejected);

    let invoice = invoice_db::get_invoice_by_id(&db, s.invoice.id).await.unwrap().unwrap();
    assert_eq!(invoice.status, invoices::Status::Pending);

    let logs = log_db::get_logs_for_order(&db, &invoice.id.to_string()).await.unwrap();
    assert!(logs[0].error.as_deref().unwrap_or_default().contains("does not match"));
    assert!(!logs[0].processed);

    // The correct callback still goes through afterwards.
    let ack = e
        .payments
        .handle_webhook(&db, &settlement_for(&s.invoice), "{}".to_string())
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Paid);
}

#[tokio::test]
async fn test_challenged_capture_is_held_until_settlement() {
    let db = setup_db().await;
    let e = engines();
    let s = staffed_project(&db, &e, 1).await;
    let order_id = s.invoice.id.to_string();
    let gross = common::gross(s.invoice.total_amount);

    let mut challenge: serde_json::Value =
        serde_json::from_str(&signed_callback(&order_id, "capture", &gross)).unwrap();
    challenge["fraud_status"] = serde_json::Value::String("challenge".to_string());

    let ack = e
        .payments
        .handle_webhook(&db, &challenge.to_string(), "{}".to_string())
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Held);

    let invoice = invoice_db::get_invoice_by_id(&db, s.invoice.id).await.unwrap().unwrap();
    assert_eq!(invoice.status, invoices::Status::Pending);

    let ack = e
        .payments
        .handle_webhook(&db, &settlement_for(&s.invoice), "{}".to_string())
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Paid);
}

#[tokio::test]
async fn test_expired_callback_fails_invoice_and_allows_reissue() {
    let db = setup_db().await;
    let e = engines();
    let s = staffed_project(&db, &e, 1).await;

    let body = signed_callback(
        &s.invoice.id.to_string(),
        "expire",
        &common::gross(s.invoice.total_amount),
    );
    let ack = e.payments.handle_webhook(&db, &body, "{}".to_string()).await.unwrap();
    assert_eq!(ack, WebhookAck::Failed);

    let failed = invoice_db::get_invoice_by_id(&db, s.invoice.id).await.unwrap().unwrap();
    assert_eq!(failed.status, invoices::Status::Failed);

    // Someone else's invoice cannot be reissued.
    let stranger = seed_user(&db, "Stranger", Roles::Farmer).await;
    assert!(matches!(
        e.invoices.reissue(&db, failed.id, stranger.id).await,
        Err(CoreError::Forbidden(_))
    ));

    let reissued = e.invoices.reissue(&db, failed.id, s.farmer.id).await.unwrap();
    assert_eq!(reissued.attempt, 2);
    assert_eq!(reissued.status, invoices::Status::Pending);
    assert_eq!(reissued.total_amount, failed.total_amount);
    assert_ne!(reissued.id, failed.id);

    assert!(matches!(
        e.invoices.reissue(&db, failed.id, s.farmer.id).await,
        Err(CoreError::IllegalState(_))
    ));

    let latest = invoice_db::latest_invoice_for(&db, Obligation::project(s.project.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, reissued.id);

    let ack = e
        .payments
        .handle_webhook(&db, &settlement_for(&reissued), "{}".to_string())
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Paid);
}

#[tokio::test]
async fn test_initiate_reuses_the_open_session() {
    let db = setup_db().await;
    let e = engines();
    let s = staffed_project(&db, &e, 1).await;

    let first = e.payments.initiate(&db, s.invoice.id, &s.farmer).await.unwrap();
    let second = e.payments.initiate(&db, s.invoice.id, &s.farmer).await.unwrap();
    assert_eq!(first.snap_token, second.snap_token);
    assert_eq!(first.redirect_url, second.redirect_url);
    assert_eq!(e.payments.gateway().sessions(), 1);

    let worker = &s.workers[0];
    assert!(matches!(
        e.payments.initiate(&db, s.invoice.id, worker).await,
        Err(CoreError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_gateway_outage_leaves_invoice_without_session() {
    let db = setup_db().await;
    let e = engines();
    let s = staffed_project(&db, &e, 1).await;

    e.payments.gateway().set_failing(true);
    assert!(matches!(
        e.payments.initiate(&db, s.invoice.id, &s.farmer).await,
        Err(CoreError::Unavailable(_))
    ));
    let invoice = invoice_db::get_invoice_by_id(&db, s.invoice.id).await.unwrap().unwrap();
    assert!(invoice.snap_token.is_none());

    e.payments.gateway().set_failing(false);
    let initiated = e.payments.initiate(&db, s.invoice.id, &s.farmer).await.unwrap();
    assert_eq!(initiated.snap_token, format!("snap-{}", s.invoice.id));
}

#[tokio::test]
async fn test_unreadable_and_unknown_callbacks() {
    let db = setup_db().await;
    let e = engines();

    assert!(matches!(
        e.payments.handle_webhook(&db, "not json", "{}".to_string()).await,
        Err(CoreError::InvalidInput(_))
    ));
    assert!(matches!(
        e.payments
            .handle_webhook(&db, r#"{"order_id": "x"}"#, "{}".to_string())
            .await,
        Err(CoreError::InvalidInput(_))
    ));

    let ack = e
        .payments
        .handle_webhook(
            &db,
            &signed_callback("ORDER-LEGACY-1", "settlement", "1000.00"),
            "{}".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::UnknownOrder);

    let ack = e
        .payments
        .handle_webhook(
            &db,
            &signed_callback(&uuid::Uuid::new_v4().to_string(), "settlement", "1000.00"),
            "{}".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::UnknownOrder);

    let logs = log_db::get_logs_for_order(&db, "ORDER-LEGACY-1").await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].error.as_deref(), Some("unknown order_id"));
}

#[tokio::test]
async fn test_busy_worker_cannot_take_a_second_job() {
    let db = setup_db().await;
    let e = engines();
    let farmer = seed_user(&db, "Farmer", Roles::Farmer).await;
    let worker = seed_user(&db, "Worker", Roles::Worker).await;

    let offer = |title: &str| DirectOffer {
        worker_id: worker.id,
        title: title.to_string(),
        description: String::new(),
        location: "Subang".to_string(),
        start_date: common::date(7, 1),
        end_date: common::date(7, 2),
        payment_type: PaymentType::PerDay,
        payment_rate: Money::from_major(120_000),
    };

    let first = e
        .contracts
        .create_direct_offer(&db, farmer.id, offer("Weeding"))
        .await
        .unwrap();
    assert_eq!(first.project.status, projects::Status::DirectOffer);
    assert_eq!(first.assignment.status, assignments::Status::Assigned);

    match e.contracts.create_direct_offer(&db, farmer.id, offer("Planting")).await {
        Err(CoreError::Conflict(message)) => assert_eq!(message, WORKER_BUSY),
        other => panic!("expected busy conflict, got {other:?}"),
    }

    // Accepting an application is blocked the same way.
    let open = board::create_project(&db, farmer.id, harvest_project(1)).await.unwrap();
    let application = board::apply(
        &db,
        open.id,
        worker.id,
        CreateApplication {
            message: String::new(),
        },
    )
    .await
    .unwrap();
    assert!(matches!(
        e.contracts.accept_application(&db, application.id, farmer.id).await,
        Err(CoreError::Conflict(_))
    ));
    let application = project_db::get_application_by_id(&db, application.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(application.status, applications::Status::Pending);
}

#[tokio::test]
async fn test_direct_offer_is_invoiced_when_the_worker_signs() {
    let db = setup_db().await;
    let e = engines();
    let farmer = seed_user(&db, "Farmer", Roles::Farmer).await;
    let worker = seed_user(&db, "Worker", Roles::Worker).await;

    let created = e
        .contracts
        .create_direct_offer(
            &db,
            farmer.id,
            DirectOffer {
                worker_id: worker.id,
                title: "Fence repair".to_string(),
                description: String::new(),
                location: "Garut".to_string(),
                start_date: common::date(8, 1),
                end_date: common::date(8, 1),
                payment_type: PaymentType::LumpSum,
                payment_rate: Money::from_major(450_000),
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        e.contracts.sign(&db, created.contract.id, farmer.id).await,
        Err(CoreError::Forbidden(_))
    ));

    let signed = e.contracts.sign(&db, created.contract.id, worker.id).await.unwrap();
    assert!(signed.contract.signed_by_second_party);
    assert!(signed.contract.signed_at.is_some());
    let invoice = signed.invoice.expect("signing a direct offer issues the invoice");
    assert_eq!(invoice.amount, Money::from_major(450_000));
    assert_eq!(invoice.platform_fee, Money::from_major(22_500));
    assert_eq!(invoice.payer_id, farmer.id);

    let project = project_db::get_project_by_id(&db, created.project.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(project.status, projects::Status::WaitingPayment);

    assert!(matches!(
        e.contracts.sign(&db, created.contract.id, worker.id).await,
        Err(CoreError::IllegalState(_))
    ));
}

#[tokio::test]
async fn test_application_rules() {
    let db = setup_db().await;
    let e = engines();
    let farmer = seed_user(&db, "Farmer", Roles::Farmer).await;
    let worker = seed_user(&db, "Worker", Roles::Worker).await;
    let project = board::create_project(&db, farmer.id, harvest_project(2)).await.unwrap();
    let msg = || CreateApplication {
        message: "Available all week".to_string(),
    };

    assert!(matches!(
        board::apply(&db, project.id, farmer.id, msg()).await,
        Err(CoreError::Forbidden(_))
    ));

    let application = board::apply(&db, project.id, worker.id, msg()).await.unwrap();
    assert!(matches!(
        board::apply(&db, project.id, worker.id, msg()).await,
        Err(CoreError::IllegalState(_))
    ));

    let stranger = seed_user(&db, "Stranger", Roles::Farmer).await;
    assert!(matches!(
        e.contracts.accept_application(&db, application.id, stranger.id).await,
        Err(CoreError::Forbidden(_))
    ));

    let withdrawn = board::withdraw_application(&db, application.id, worker.id).await.unwrap();
    assert_eq!(withdrawn.status, applications::Status::Withdrawn);
    assert!(matches!(
        e.contracts.accept_application(&db, application.id, farmer.id).await,
        Err(CoreError::IllegalState(_))
    ));

    let mut bad = harvest_project(0);
    assert!(matches!(
        board::create_project(&db, farmer.id, bad.clone()).await,
        Err(CoreError::InvalidInput(_))
    ));
    bad.workers_needed = 1;
    bad.start_date = common::date(6, 5);
    assert!(matches!(
        board::create_project(&db, farmer.id, bad).await,
        Err(CoreError::InvalidInput(_))
    ));
}
