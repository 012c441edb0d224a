//! Payment Orchestrator: gateway sessions, checkout, webhook reconciliation and
//! the invoice timeout sweeper.

mod checkout;
pub mod settlement;
pub mod sweeper;
mod webhook;

pub use checkout::{CheckoutResult, generate_invoice_number};
pub use webhook::WebhookAck;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::db::{commerce as commerce_db, invoices as invoice_db};
use crate::error::{CoreError, CoreResult};
use crate::gateway::{CustomerDetails, PaymentGateway, SessionRequest, SessionResponse};
use crate::models::invoices::{self, ObligationType};
use crate::models::{ecommerce_payments, users};
use crate::money::Money;
use crate::services::invoices::InvoiceEngine;

/// What the payer needs to open the hosted checkout.
#[derive(Debug, Clone, Serialize)]
pub struct InitiatedPayment {
    pub snap_token: String,
    pub redirect_url: String,
    pub order_id: Uuid,
    pub amount: Money,
}

pub struct PaymentOrchestrator<G> {
    gateway: G,
    invoices: InvoiceEngine,
}

impl<G: PaymentGateway> PaymentOrchestrator<G> {
    pub fn new(gateway: G, invoices: InvoiceEngine) -> Self {
        Self { gateway, invoices }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    async fn open_session(
        &self,
        order_id: Uuid,
        amount: Money,
        payer: &users::Model,
    ) -> CoreResult<SessionResponse> {
        let request = SessionRequest {
            order_id: order_id.to_string(),
            gross_amount: amount.minor(),
            customer: CustomerDetails {
                first_name: payer.name.clone(),
                email: payer.email.clone(),
                phone: payer.phone.clone(),
            },
        };
        Ok(self.gateway.create_session(&request).await?)
    }

    /// Open (or resume) the gateway session for a pending invoice or
    /// e-commerce payment.
    pub async fn initiate(
        &self,
        db: &DatabaseConnection,
        target_id: Uuid,
        payer: &users::Model,
    ) -> CoreResult<InitiatedPayment> {
        let txn = db.begin().await?;

        let mut payment_id = target_id;
        if let Some(peek) = invoice_db::get_invoice_by_id(&txn, target_id).await? {
            if peek.obligation_type != ObligationType::Ecommerce {
                let invoice = invoice_db::lock_invoice(&txn, target_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("Invoice", target_id))?;
                return self.initiate_invoice(txn, invoice, payer).await;
            }
            // E-commerce sessions are keyed by the payment, not its invoice.
            payment_id = peek.obligation_id;
        }

        if let Some(payment) = commerce_db::lock_payment(&txn, payment_id).await? {
            return self.initiate_ecommerce(txn, payment, payer).await;
        }

        Err(CoreError::not_found("Invoice or payment", target_id))
    }

    async fn initiate_invoice(
        &self,
        txn: DatabaseTransaction,
        invoice: invoices::Model,
        payer: &users::Model,
    ) -> CoreResult<InitiatedPayment> {
        if invoice.payer_id != payer.id {
            return Err(CoreError::Forbidden(
                "This invoice belongs to another payer".to_string(),
            ));
        }
        if invoice.status != invoices::Status::Pending {
            return Err(CoreError::IllegalState(format!(
                "Invoice {} is not pending",
                invoice.id
            )));
        }

        if let (Some(token), Some(url)) = (invoice.snap_token.clone(), invoice.redirect_url.clone())
        {
            txn.commit().await?;
            return Ok(InitiatedPayment {
                snap_token: token,
                redirect_url: url,
                order_id: invoice.id,
                amount: invoice.total_amount,
            });
        }

        let session = self
            .open_session(invoice.id, invoice.total_amount, payer)
            .await?;
        let invoice =
            invoice_db::store_session(&txn, invoice, session.token, session.redirect_url).await?;
        txn.commit().await?;

        info!(invoice_id = %invoice.id, amount = %invoice.total_amount, "Payment session opened");
        Ok(InitiatedPayment {
            snap_token: invoice.snap_token.unwrap_or_default(),
            redirect_url: invoice.redirect_url.unwrap_or_default(),
            order_id: invoice.id,
            amount: invoice.total_amount,
        })
    }

    async fn initiate_ecommerce(
        &self,
        txn: DatabaseTransaction,
        payment: ecommerce_payments::Model,
        payer: &users::Model,
    ) -> CoreResult<InitiatedPayment> {
        if payment.customer_id != payer.id {
            return Err(CoreError::Forbidden(
                "This payment belongs to another customer".to_string(),
            ));
        }
        if payment.status != ecommerce_payments::Status::Pending {
            return Err(CoreError::IllegalState(format!(
                "Payment {} is not pending",
                payment.id
            )));
        }

        if let (Some(token), Some(url)) = (payment.snap_token.clone(), payment.redirect_url.clone())
        {
            txn.commit().await?;
            return Ok(InitiatedPayment {
                snap_token: token,
                redirect_url: url,
                order_id: payment.id,
                amount: payment.grand_total,
            });
        }

        let session = self
            .open_session(payment.id, payment.grand_total, payer)
            .await?;
        let payment = commerce_db::store_payment_session(
            &txn,
            payment,
            session.token,
            session.redirect_url,
        )
        .await?;
        txn.commit().await?;

        info!(payment_id = %payment.id, amount = %payment.grand_total, "Payment session opened");
        Ok(InitiatedPayment {
            snap_token: payment.snap_token.unwrap_or_default(),
            redirect_url: payment.redirect_url.unwrap_or_default(),
            order_id: payment.id,
            amount: payment.grand_total,
        })
    }
}
