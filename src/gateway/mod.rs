//! Payment Gateway Adapter.
//!
//! The orchestrator only depends on [`PaymentGateway`]; production wires in
//! [`snap::SnapGateway`], tests wire in a fake.

pub mod signature;
pub mod snap;

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use snap::SnapGateway;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("payment gateway timed out")]
    Timeout,

    #[error("payment gateway unreachable: {0}")]
    Transport(String),

    #[error("payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetails {
    pub first_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// What the orchestrator asks the gateway for. `order_id` is the obligation id,
/// so a retried request names the same session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub order_id: String,
    /// Integer amount in minor units.
    pub gross_amount: i64,
    pub customer: CustomerDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub redirect_url: String,
}

/// Hosted-checkout collaborator.
pub trait PaymentGateway: Send + Sync {
    fn create_session(
        &self,
        request: &SessionRequest,
    ) -> impl Future<Output = Result<SessionResponse, GatewayError>> + Send;

    /// Shared key used to sign callbacks.
    fn server_key(&self) -> &str;

    /// Name recorded on webhook logs.
    fn provider(&self) -> &'static str {
        "midtrans"
    }
}

/// The callback fields the core consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// What a callback asks the core to do with its obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Paid,
    Failed,
    /// Leave the obligation pending.
    Hold,
}

impl Notification {
    pub fn outcome(&self) -> Outcome {
        let fraud = self.fraud_status.as_deref().unwrap_or("accept");
        match self.transaction_status.as_str() {
            "settlement" => Outcome::Paid,
            "capture" if fraud == "accept" => Outcome::Paid,
            "capture" => Outcome::Hold,
            "deny" | "cancel" | "expire" => Outcome::Failed,
            _ => Outcome::Hold,
        }
    }

    /// The callback's gross amount in minor units.
    ///
    /// The gateway echoes the integer it was given, sometimes with a zero
    /// fraction appended (`"63000000.00"`).
    pub fn gross_minor(&self) -> Option<i64> {
        let raw = self.gross_amount.trim();
        let (whole, frac) = raw.split_once('.').unwrap_or((raw, ""));
        if !frac.bytes().all(|b| b == b'0') {
            return None;
        }
        whole.parse().ok()
    }

    /// Transaction reference: the gateway's own id, or the order id.
    pub fn reference(&self) -> String {
        self.transaction_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.order_id.clone())
    }
}
