//! Marketplace checkout: stock reservation, settlement, failure and expiry.
//!
//! Run with: `cargo test --test commerce_flow_test`
mod common;

use agrimarket_backend::db::{
    commerce as commerce_db, invoices as invoice_db, ledger as ledger_db,
};
use agrimarket_backend::error::CoreError;
use agrimarket_backend::models::payouts::PayeeType;
use agrimarket_backend::models::users::Roles;
use agrimarket_backend::models::{ecommerce_payments, invoices, orders, products};
use agrimarket_backend::money::Money;
use agrimarket_backend::services::inventory;
use agrimarket_backend::services::payments::{WebhookAck, sweeper};
use common::{add_to_cart, engines, gross, seed_product, seed_user, setup_db, signed_callback};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

async fn product(db: &DatabaseConnection, id: Uuid) -> products::Model {
    commerce_db::get_product_by_id(db, id).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_checkout_reserves_exactly_the_available_stock() {
    let db = setup_db().await;
    let e = engines();
    let seller = seed_user(&db, "Seller", Roles::Farmer).await;
    let buyer = seed_user(&db, "Buyer", Roles::Farmer).await;
    let chili = seed_product(&db, seller.id, "Red chili 1kg", 40_000, 5).await;

    add_to_cart(&db, buyer.id, chili.id, 5).await;
    let result = e.payments.checkout(&db, &buyer).await.unwrap();

    assert_eq!(result.orders.len(), 1);
    assert_eq!(result.payment.grand_total, Money::from_major(200_000));
    assert_eq!(result.invoice.total_amount, result.payment.grand_total);
    assert_eq!(result.invoice.platform_fee, Money::from_major(10_000));
    assert_eq!(result.snap_token, format!("snap-{}", result.payment.id));
    assert!(result.orders[0].invoice_number.starts_with("INV-"));

    let chili = product(&db, chili.id).await;
    assert_eq!(chili.stock, 5);
    assert_eq!(chili.reserved_stock, 5);

    // The cart was consumed; a second checkout has nothing to buy.
    assert!(matches!(
        e.payments.checkout(&db, &buyer).await,
        Err(CoreError::IllegalState(_))
    ));
}

#[tokio::test]
async fn test_checkout_beyond_available_stock_is_a_conflict() {
    let db = setup_db().await;
    let e = engines();
    let seller = seed_user(&db, "Seller", Roles::Farmer).await;
    let first = seed_user(&db, "First", Roles::Farmer).await;
    let second = seed_user(&db, "Second", Roles::Farmer).await;
    let shallots = seed_product(&db, seller.id, "Shallots 1kg", 35_000, 5).await;

    add_to_cart(&db, first.id, shallots.id, 2).await;
    e.payments.checkout(&db, &first).await.unwrap();

    // Three left; four is one too many.
    add_to_cart(&db, second.id, shallots.id, 4).await;
    assert!(matches!(
        e.payments.checkout(&db, &second).await,
        Err(CoreError::Conflict(_))
    ));

    let shallots = product(&db, shallots.id).await;
    assert_eq!(shallots.reserved_stock, 2);
}

#[tokio::test]
async fn test_concurrent_checkouts_never_oversell() {
    let db = setup_db().await;
    let e = engines();
    let seller = seed_user(&db, "Seller", Roles::Farmer).await;
    let a = seed_user(&db, "BuyerA", Roles::Farmer).await;
    let b = seed_user(&db, "BuyerB", Roles::Farmer).await;
    let melon = seed_product(&db, seller.id, "Melon", 20_000, 5).await;

    add_to_cart(&db, a.id, melon.id, 3).await;
    add_to_cart(&db, b.id, melon.id, 3).await;

    let (ra, rb) = tokio::join!(e.payments.checkout(&db, &a), e.payments.checkout(&db, &b));
    let succeeded = [ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(succeeded, 1);
    assert!(matches!(ra.err().or(rb.err()), Some(CoreError::Conflict(_))));

    let melon = product(&db, melon.id).await;
    assert_eq!(melon.reserved_stock, 3);
    assert!(melon.reserved_stock <= melon.stock);
}

#[tokio::test]
async fn test_paid_checkout_debits_stock_and_owes_each_seller() {
    let db = setup_db().await;
    let e = engines();
    let seller_a = seed_user(&db, "SellerA", Roles::Farmer).await;
    let seller_b = seed_user(&db, "SellerB", Roles::Farmer).await;
    let buyer = seed_user(&db, "Buyer", Roles::Farmer).await;
    let rice = seed_product(&db, seller_a.id, "Rice 5kg", 10_000, 5).await;
    let honey = seed_product(&db, seller_b.id, "Forest honey", 25_000, 2).await;

    add_to_cart(&db, buyer.id, rice.id, 3).await;
    add_to_cart(&db, buyer.id, honey.id, 1).await;
    let checkout = e.payments.checkout(&db, &buyer).await.unwrap();
    assert_eq!(checkout.orders.len(), 2);
    assert_eq!(checkout.payment.grand_total, Money::from_major(55_000));

    let body = signed_callback(
        &checkout.payment.id.to_string(),
        "settlement",
        &gross(checkout.payment.grand_total),
    );
    let ack = e.payments.handle_webhook(&db, &body, "{}".to_string()).await.unwrap();
    assert_eq!(ack, WebhookAck::Paid);

    let rice = product(&db, rice.id).await;
    assert_eq!((rice.stock, rice.reserved_stock), (2, 0));
    let honey = product(&db, honey.id).await;
    assert_eq!((honey.stock, honey.reserved_stock), (1, 0));

    let payment = commerce_db::get_payment_by_id(&db, checkout.payment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, ecommerce_payments::Status::Paid);
    assert!(payment.paid_at.is_some());

    let paid_orders = commerce_db::get_orders_for_payment(&db, payment.id).await.unwrap();
    assert!(paid_orders.iter().all(|o| o.status == orders::Status::Paid));

    let invoice = invoice_db::get_invoice_by_id(&db, checkout.invoice.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(invoice.status, invoices::Status::Paid);

    let transaction = ledger_db::get_transaction_by_invoice(&db, invoice.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transaction.amount_paid, Money::from_major(55_000));

    let payouts = ledger_db::get_payouts_by_transaction(&db, transaction.id).await.unwrap();
    assert_eq!(payouts.len(), 2);
    assert!(payouts.iter().all(|p| p.payee_type == PayeeType::Seller));
    let owed = |seller: Uuid| {
        payouts
            .iter()
            .find(|p| p.payee_id == seller)
            .map(|p| p.amount)
            .unwrap()
    };
    assert_eq!(owed(seller_a.id), Money::from_major(28_500));
    assert_eq!(owed(seller_b.id), Money::from_major(23_750));
    assert_eq!(
        payouts.iter().map(|p| p.amount).sum::<Money>(),
        invoice.amount
    );
}

#[tokio::test]
async fn test_failed_payment_releases_reservations() {
    let db = setup_db().await;
    let e = engines();
    let seller = seed_user(&db, "Seller", Roles::Farmer).await;
    let buyer = seed_user(&db, "Buyer", Roles::Farmer).await;
    let eggs = seed_product(&db, seller.id, "Eggs (tray)", 55_000, 4).await;

    add_to_cart(&db, buyer.id, eggs.id, 4).await;
    let checkout = e.payments.checkout(&db, &buyer).await.unwrap();

    let body = signed_callback(
        &checkout.payment.id.to_string(),
        "deny",
        &gross(checkout.payment.grand_total),
    );
    let ack = e.payments.handle_webhook(&db, &body, "{}".to_string()).await.unwrap();
    assert_eq!(ack, WebhookAck::Failed);

    let eggs = product(&db, eggs.id).await;
    assert_eq!((eggs.stock, eggs.reserved_stock), (4, 0));

    let cancelled = commerce_db::get_orders_for_payment(&db, checkout.payment.id)
        .await
        .unwrap();
    assert!(cancelled.iter().all(|o| o.status == orders::Status::Cancelled));

    let invoice = invoice_db::get_invoice_by_id(&db, checkout.invoice.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(invoice.status, invoices::Status::Failed);
}

#[tokio::test]
async fn test_sweeper_expires_abandoned_checkout() {
    let db = setup_db().await;
    let e = engines();
    let seller = seed_user(&db, "Seller", Roles::Farmer).await;
    let buyer = seed_user(&db, "Buyer", Roles::Farmer).await;
    let corn = seed_product(&db, seller.id, "Sweet corn", 8_000, 10).await;

    add_to_cart(&db, buyer.id, corn.id, 6).await;
    let checkout = e.payments.checkout(&db, &buyer).await.unwrap();
    let due = checkout.invoice.due_date;

    let expired = sweeper::expire_overdue(&db, due + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(expired, vec![checkout.invoice.id]);

    let payment = commerce_db::get_payment_by_id(&db, checkout.payment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, ecommerce_payments::Status::Failed);
    assert_eq!(product(&db, corn.id).await.reserved_stock, 0);

    // A late settlement is flagged, not applied.
    let body = signed_callback(
        &checkout.payment.id.to_string(),
        "settlement",
        &gross(checkout.payment.grand_total),
    );
    let ack = e.payments.handle_webhook(&db, &body, "{}".to_string()).await.unwrap();
    assert_eq!(ack, WebhookAck::LatePayment);
}

#[tokio::test]
async fn test_gateway_outage_rolls_back_checkout() {
    let db = setup_db().await;
    let e = engines();
    let seller = seed_user(&db, "Seller", Roles::Farmer).await;
    let buyer = seed_user(&db, "Buyer", Roles::Farmer).await;
    let garlic = seed_product(&db, seller.id, "Garlic", 30_000, 3).await;
    add_to_cart(&db, buyer.id, garlic.id, 2).await;

    e.payments.gateway().set_failing(true);
    assert!(matches!(
        e.payments.checkout(&db, &buyer).await,
        Err(CoreError::Unavailable(_))
    ));
    assert_eq!(product(&db, garlic.id).await.reserved_stock, 0);

    e.payments.gateway().set_failing(false);
    let checkout = e.payments.checkout(&db, &buyer).await.unwrap();
    assert_eq!(checkout.payment.grand_total, Money::from_major(60_000));

    // Initiating again, by payment or by invoice, resumes the same session.
    let by_payment = e.payments.initiate(&db, checkout.payment.id, &buyer).await.unwrap();
    let by_invoice = e.payments.initiate(&db, checkout.invoice.id, &buyer).await.unwrap();
    assert_eq!(by_payment.snap_token, checkout.snap_token);
    assert_eq!(by_invoice.order_id, checkout.payment.id);
    assert_eq!(e.payments.gateway().sessions(), 1);
}

#[tokio::test]
async fn test_stock_updates_respect_ownership_and_reservations() {
    let db = setup_db().await;
    let e = engines();
    let seller = seed_user(&db, "Seller", Roles::Farmer).await;
    let other = seed_user(&db, "Other", Roles::Farmer).await;
    let buyer = seed_user(&db, "Buyer", Roles::Farmer).await;
    let tomato = seed_product(&db, seller.id, "Tomatoes", 12_000, 10).await;

    add_to_cart(&db, buyer.id, tomato.id, 4).await;
    e.payments.checkout(&db, &buyer).await.unwrap();

    assert!(matches!(
        inventory::update_stock(&db, tomato.id, seller.id, -1).await,
        Err(CoreError::InvalidInput(_))
    ));
    assert!(matches!(
        inventory::update_stock(&db, tomato.id, other.id, 20).await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(
        inventory::update_stock(&db, tomato.id, seller.id, 3).await,
        Err(CoreError::Conflict(_))
    ));

    let updated = inventory::update_stock(&db, tomato.id, seller.id, 4).await.unwrap();
    assert_eq!((updated.stock, updated.reserved_stock), (4, 4));
}
