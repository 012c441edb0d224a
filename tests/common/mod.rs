#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{Duration, NaiveDate};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::json;
use uuid::Uuid;

use agrimarket_backend::db::{commerce as commerce_db, users as user_db};
use agrimarket_backend::gateway::{
    GatewayError, PaymentGateway, SessionRequest, SessionResponse, signature,
};
use agrimarket_backend::models::projects::{CreateProject, PaymentType};
use agrimarket_backend::models::users::{self, Roles};
use agrimarket_backend::models::{invoices, products};
use agrimarket_backend::money::Money;
use agrimarket_backend::services::contracts::ContractEngine;
use agrimarket_backend::services::invoices::{InvoiceEngine, InvoicePolicy};
use agrimarket_backend::services::payments::PaymentOrchestrator;

pub const SERVER_KEY: &str = "SB-Mid-server-test-key";

/// A single pooled connection keeps the in-memory database alive and
/// serializes transactions the way row locks would.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

/// Records how often a session was requested; can be switched to fail.
#[derive(Default)]
pub struct FakeGateway {
    sessions: AtomicUsize,
    failing: AtomicBool,
}

impl FakeGateway {
    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl PaymentGateway for FakeGateway {
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<SessionResponse, GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Timeout);
        }
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(SessionResponse {
            token: format!("snap-{}", request.order_id),
            redirect_url: format!("https://pay.test/{}", request.order_id),
        })
    }

    fn server_key(&self) -> &str {
        SERVER_KEY
    }
}

pub fn policy() -> InvoicePolicy {
    InvoicePolicy {
        fee_bps: 500,
        timeout: Duration::hours(48),
    }
}

pub struct Engines {
    pub invoices: InvoiceEngine,
    pub contracts: ContractEngine,
    pub payments: PaymentOrchestrator<FakeGateway>,
}

pub fn engines() -> Engines {
    let invoices = InvoiceEngine::new(policy());
    Engines {
        contracts: ContractEngine::new(invoices.clone()),
        payments: PaymentOrchestrator::new(FakeGateway::default(), invoices.clone()),
        invoices,
    }
}

pub async fn seed_user(db: &DatabaseConnection, name: &str, role: Roles) -> users::Model {
    let email = format!("{}-{}@agri.test", name.to_lowercase(), Uuid::new_v4().simple());
    user_db::insert_user(db, &email, name, role)
        .await
        .expect("Failed to seed user")
}

pub async fn seed_product(
    db: &DatabaseConnection,
    farmer_id: Uuid,
    name: &str,
    price_major: i64,
    stock: i32,
) -> products::Model {
    commerce_db::insert_product(db, farmer_id, name, Money::from_major(price_major), stock)
        .await
        .expect("Failed to seed product")
}

pub async fn add_to_cart(db: &DatabaseConnection, user_id: Uuid, product_id: Uuid, qty: i32) {
    commerce_db::insert_cart_item(db, user_id, product_id, qty)
        .await
        .expect("Failed to seed cart item");
}

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).unwrap()
}

/// Two workers, 100 000 per day, 1–3 June.
pub fn harvest_project(workers_needed: i32) -> CreateProject {
    CreateProject {
        title: "Rice harvest".to_string(),
        description: "Cut and bundle two paddies".to_string(),
        location: "Karawang".to_string(),
        workers_needed,
        start_date: date(6, 1),
        end_date: date(6, 3),
        payment_type: PaymentType::PerDay,
        payment_rate: Money::from_major(100_000),
    }
}

/// Callback body as the gateway would send it, signed with [`SERVER_KEY`].
pub fn signed_callback(order_id: &str, transaction_status: &str, gross_amount: &str) -> String {
    let sig = signature::sign(order_id, "200", gross_amount, SERVER_KEY);
    json!({
        "order_id": order_id,
        "transaction_status": transaction_status,
        "fraud_status": "accept",
        "payment_type": "bank_transfer",
        "status_code": "200",
        "gross_amount": gross_amount,
        "signature_key": sig,
        "transaction_id": format!("tx-{order_id}"),
    })
    .to_string()
}

/// `settlement` for the full total of an invoice.
pub fn settlement_for(invoice: &invoices::Model) -> String {
    signed_callback(
        &invoice.id.to_string(),
        "settlement",
        &gross(invoice.total_amount),
    )
}

/// Gross amount the way the gateway echoes it: integer minor units plus `.00`.
pub fn gross(amount: Money) -> String {
    format!("{}.00", amount.minor())
}
