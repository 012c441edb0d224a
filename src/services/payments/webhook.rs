use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::PaymentOrchestrator;
use super::settlement::{self, PaymentDetails};
use crate::db::webhook_logs::{self as log_db, NewWebhookLog};
use crate::db::{commerce as commerce_db, invoices as invoice_db};
use crate::error::{CoreError, CoreResult};
use crate::gateway::{Notification, Outcome, PaymentGateway, signature};
use crate::models::invoices::{self, Obligation, ObligationType};
use crate::models::ecommerce_payments;
use crate::money::Money;

/// How a callback was handled. Every variant answers 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAck {
    /// The obligation transitioned to paid.
    Paid,
    /// The obligation transitioned to failed.
    Failed,
    /// Non-terminal status; the obligation stays pending.
    Held,
    /// An earlier callback for this order was already processed.
    Duplicate,
    /// The obligation had already left pending.
    AlreadySettled,
    /// Money was captured for an obligation that had already failed.
    LatePayment,
    UnknownOrder,
    /// Signed correctly but inconsistent with the obligation.
    Rejected,
}

impl WebhookAck {
    fn is_terminal(self) -> bool {
        matches!(self, WebhookAck::Paid | WebhookAck::Failed)
    }
}

fn field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn check_amount(notification: &Notification, expected: Money) -> CoreResult<()> {
    match notification.gross_minor() {
        Some(gross) if gross == expected.minor() => Ok(()),
        _ => Err(CoreError::IntegrityViolation(format!(
            "gross_amount {} does not match obligation total {} ({} minor units)",
            notification.gross_amount,
            expected,
            expected.minor()
        ))),
    }
}

impl<G: PaymentGateway> PaymentOrchestrator<G> {
    /// Consume one gateway callback.
    ///
    /// The raw callback is logged before anything else. A bad signature is
    /// `Unauthorized` and an unparseable body `InvalidInput`; store failures
    /// propagate so the gateway retries. Everything else is acknowledged.
    pub async fn handle_webhook(
        &self,
        db: &DatabaseConnection,
        raw_body: &str,
        headers: String,
    ) -> CoreResult<WebhookAck> {
        let provider = self.gateway.provider().to_string();

        let value: Value = match serde_json::from_str(raw_body) {
            Ok(value) => value,
            Err(e) => {
                let message = format!("malformed callback body: {e}");
                log_db::insert_log(
                    db,
                    NewWebhookLog {
                        provider,
                        raw_body: raw_body.to_string(),
                        headers,
                        error: Some(message.clone()),
                        ..Default::default()
                    },
                )
                .await?;
                warn!("{message}");
                return Err(CoreError::InvalidInput(message));
            }
        };

        let mut entry = NewWebhookLog {
            provider: provider.clone(),
            order_id: field(&value, "order_id"),
            transaction_status: field(&value, "transaction_status"),
            fraud_status: value
                .get("fraud_status")
                .and_then(Value::as_str)
                .map(str::to_string),
            status_code: field(&value, "status_code"),
            gross_amount: field(&value, "gross_amount"),
            signature_key: field(&value, "signature_key"),
            signature_valid: false,
            raw_body: raw_body.to_string(),
            headers,
            parsed_body: Some(value.to_string()),
            error: None,
        };

        let notification: Notification = match serde_json::from_value(value) {
            Ok(n) => n,
            Err(e) => {
                let message = format!("callback is missing required fields: {e}");
                entry.error = Some(message.clone());
                log_db::insert_log(db, entry).await?;
                warn!("{message}");
                return Err(CoreError::InvalidInput(message));
            }
        };

        entry.signature_valid = signature::verify(
            &notification.order_id,
            &notification.status_code,
            &notification.gross_amount,
            self.gateway.server_key(),
            &notification.signature_key,
        );
        let signature_valid = entry.signature_valid;
        let log = log_db::insert_log(db, entry).await?;

        if !signature_valid {
            warn!(order_id = %notification.order_id, log_id = %log.id, "Callback signature mismatch");
            return Err(CoreError::Unauthorized(
                "invalid callback signature".to_string(),
            ));
        }

        if log_db::has_processed_log(db, &provider, &notification.order_id).await? {
            info!(order_id = %notification.order_id, "Duplicate callback ignored");
            return Ok(WebhookAck::Duplicate);
        }

        match self.apply_notification(db, &notification).await {
            Ok(ack) => {
                if ack.is_terminal() {
                    log_db::mark_processed(db, log).await?;
                } else if ack == WebhookAck::UnknownOrder {
                    log_db::record_error(db, log, "unknown order_id".to_string()).await?;
                } else if ack == WebhookAck::LatePayment {
                    log_db::record_error(
                        db,
                        log,
                        "payment captured after the obligation failed".to_string(),
                    )
                    .await?;
                }
                Ok(ack)
            }
            Err(CoreError::IntegrityViolation(message)) => {
                error!(
                    order_id = %notification.order_id,
                    error = %message,
                    "Callback rejected as inconsistent"
                );
                log_db::record_error(db, log, message).await?;
                Ok(WebhookAck::Rejected)
            }
            Err(e) => {
                log_db::record_error(db, log, e.to_string()).await?;
                Err(e)
            }
        }
    }

    /// Apply the callback's outcome under a row lock on the obligation.
    async fn apply_notification(
        &self,
        db: &DatabaseConnection,
        notification: &Notification,
    ) -> CoreResult<WebhookAck> {
        let Ok(order_id) = Uuid::parse_str(&notification.order_id) else {
            warn!(order_id = %notification.order_id, "Callback for an unknown order");
            return Ok(WebhookAck::UnknownOrder);
        };

        let outcome = notification.outcome();
        let details = PaymentDetails {
            method: notification
                .payment_type
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            reference: notification.reference(),
        };
        let now = Utc::now();

        let txn = db.begin().await?;

        if let Some(invoice) = invoice_db::lock_invoice(&txn, order_id).await? {
            if invoice.obligation_type == ObligationType::Ecommerce {
                warn!(invoice_id = %invoice.id, "E-commerce callback keyed by invoice id");
                return Ok(WebhookAck::UnknownOrder);
            }
            if invoice.status != invoices::Status::Pending {
                if outcome == Outcome::Paid && invoice.status == invoices::Status::Failed {
                    error!(
                        invoice_id = %invoice.id,
                        gross_amount = %notification.gross_amount,
                        "Payment captured for a failed invoice"
                    );
                    return Ok(WebhookAck::LatePayment);
                }
                info!(invoice_id = %invoice.id, status = ?invoice.status, "Invoice already settled");
                return Ok(WebhookAck::AlreadySettled);
            }

            let ack = match outcome {
                Outcome::Hold => return Ok(WebhookAck::Held),
                Outcome::Paid => {
                    check_amount(notification, invoice.total_amount)?;
                    settlement::settle_invoice(&txn, invoice, &details, now).await?;
                    WebhookAck::Paid
                }
                Outcome::Failed => {
                    settlement::fail_invoice(&txn, invoice).await?;
                    WebhookAck::Failed
                }
            };
            txn.commit().await?;
            return Ok(ack);
        }

        if let Some(payment) = commerce_db::lock_payment(&txn, order_id).await? {
            if payment.status != ecommerce_payments::Status::Pending {
                if outcome == Outcome::Paid && payment.status == ecommerce_payments::Status::Failed {
                    error!(
                        payment_id = %payment.id,
                        gross_amount = %notification.gross_amount,
                        "Payment captured for a failed checkout"
                    );
                    return Ok(WebhookAck::LatePayment);
                }
                info!(payment_id = %payment.id, status = ?payment.status, "Payment already settled");
                return Ok(WebhookAck::AlreadySettled);
            }
            let invoice =
                invoice_db::lock_pending_invoice_for(&txn, Obligation::ecommerce(payment.id))
                    .await?;

            let ack = match outcome {
                Outcome::Hold => return Ok(WebhookAck::Held),
                Outcome::Paid => {
                    check_amount(notification, payment.grand_total)?;
                    let invoice = invoice.ok_or_else(|| {
                        CoreError::IntegrityViolation(format!(
                            "payment {} has no pending invoice",
                            payment.id
                        ))
                    })?;
                    settlement::settle_payment(
                        &txn,
                        self.invoices.policy(),
                        payment,
                        invoice,
                        &details,
                        now,
                    )
                    .await?;
                    WebhookAck::Paid
                }
                Outcome::Failed => {
                    settlement::fail_payment(&txn, payment, invoice).await?;
                    WebhookAck::Failed
                }
            };
            txn.commit().await?;
            return Ok(ack);
        }

        warn!(order_id = %order_id, "Callback for an unknown order");
        Ok(WebhookAck::UnknownOrder)
    }
}
