//! Terminal transitions of an obligation: paid (escrow + payouts) or failed.
//!
//! Every function here runs inside the caller's transaction, on rows the
//! caller has already locked.

use chrono::{DateTime, Utc};
use sea_orm::ConnectionTrait;
use tracing::{error, info};

use crate::db::{
    commerce as commerce_db, invoices as invoice_db, ledger as ledger_db,
    projects as project_db, deliveries as delivery_db,
};
use crate::error::{CoreError, CoreResult};
use crate::models::invoices::{self, ObligationType};
use crate::models::payouts::PayeeType;
use crate::models::{deliveries, ecommerce_payments, orders, projects, transactions};
use crate::money::Money;
use crate::services::invoices::InvoicePolicy;

/// How the payer paid, as reported by the gateway.
#[derive(Debug, Clone)]
pub struct PaymentDetails {
    pub method: String,
    pub reference: String,
}

/// Who gets what out of a paid invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutShare {
    pub payee_id: uuid::Uuid,
    pub payee_type: PayeeType,
    pub amount: Money,
}

/// Mark the invoice paid and open escrow: one transaction, its payouts and the
/// platform's profit.
async fn open_escrow<C: ConnectionTrait>(
    conn: &C,
    invoice: invoices::Model,
    shares: Vec<PayoutShare>,
    details: &PaymentDetails,
    now: DateTime<Utc>,
) -> CoreResult<transactions::Model> {
    let payout_total: Money = shares.iter().map(|s| s.amount).sum();
    if shares.is_empty() || payout_total != invoice.amount {
        return Err(CoreError::IntegrityViolation(format!(
            "payouts for invoice {} sum to {payout_total}, expected {}",
            invoice.id, invoice.amount
        )));
    }

    let source = invoice.obligation_type;
    let fee = invoice.platform_fee;
    let invoice = invoice_db::mark_invoice_paid(conn, invoice, now).await?;

    let transaction = ledger_db::insert_transaction(
        conn,
        invoice.id,
        invoice.total_amount,
        details.method.clone(),
        details.reference.clone(),
        now,
    )
    .await?;

    for share in &shares {
        ledger_db::insert_payout(
            conn,
            transaction.id,
            share.payee_id,
            share.payee_type,
            share.amount,
            now,
        )
        .await?;
    }
    ledger_db::insert_platform_profit(conn, transaction.id, source, fee).await?;

    info!(
        invoice_id = %invoice.id,
        transaction_id = %transaction.id,
        amount_paid = %transaction.amount_paid,
        payouts = shares.len(),
        "Invoice paid, funds held in escrow"
    );
    Ok(transaction)
}

/// Paid callback for a project or delivery invoice.
pub async fn settle_invoice<C: ConnectionTrait>(
    conn: &C,
    invoice: invoices::Model,
    details: &PaymentDetails,
    now: DateTime<Utc>,
) -> CoreResult<transactions::Model> {
    match invoice.obligation_type {
        ObligationType::Project => {
            let project = project_db::lock_project(conn, invoice.obligation_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Project", invoice.obligation_id))?;
            if project.status != projects::Status::WaitingPayment {
                return Err(CoreError::IntegrityViolation(format!(
                    "invoice {} paid while project {} is {:?}",
                    invoice.id, project.id, project.status
                )));
            }

            let assignments = project_db::list_staffed_assignments(conn, project.id).await?;
            let shares = invoice
                .amount
                .split(assignments.len())
                .into_iter()
                .zip(&assignments)
                .map(|(amount, a)| PayoutShare {
                    payee_id: a.worker_id,
                    payee_type: PayeeType::Worker,
                    amount,
                })
                .collect();

            let transaction = open_escrow(conn, invoice, shares, details, now).await?;

            let project =
                project_db::update_project_status(conn, project, projects::Status::InProgress)
                    .await?;
            info!(project_id = %project.id, "Project in progress");
            Ok(transaction)
        }
        ObligationType::Delivery => {
            let delivery = delivery_db::lock_delivery(conn, invoice.obligation_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Delivery", invoice.obligation_id))?;
            if delivery.status != deliveries::Status::PendingSignature {
                return Err(CoreError::IntegrityViolation(format!(
                    "invoice {} paid while delivery {} is {:?}",
                    invoice.id, delivery.id, delivery.status
                )));
            }
            let driver_id = delivery.driver_id.ok_or_else(|| {
                CoreError::IntegrityViolation(format!(
                    "delivery {} was invoiced without a driver",
                    delivery.id
                ))
            })?;

            let shares = vec![PayoutShare {
                payee_id: driver_id,
                payee_type: PayeeType::Driver,
                amount: invoice.amount,
            }];
            open_escrow(conn, invoice, shares, details, now).await
        }
        ObligationType::Ecommerce => Err(CoreError::IntegrityViolation(format!(
            "e-commerce invoice {} must be settled through its payment",
            invoice.id
        ))),
    }
}

/// Seller shares: each order's total minus its fee; the last seller absorbs
/// any rounding difference against the invoice base.
pub fn seller_shares(
    policy: &InvoicePolicy,
    orders: &[orders::Model],
    invoice_amount: Money,
) -> Vec<PayoutShare> {
    let mut shares: Vec<PayoutShare> = orders
        .iter()
        .map(|o| PayoutShare {
            payee_id: o.seller_id,
            payee_type: PayeeType::Seller,
            amount: o.total_amount - policy.fee(o.total_amount),
        })
        .collect();

    let assigned: Money = shares.iter().map(|s| s.amount).sum();
    if let Some(last) = shares.last_mut() {
        last.amount = last.amount + (invoice_amount - assigned);
    }
    shares
}

/// Paid callback for an e-commerce payment: orders paid, stock debited,
/// reservations released, sellers owed.
pub async fn settle_payment<C: ConnectionTrait>(
    conn: &C,
    policy: &InvoicePolicy,
    payment: ecommerce_payments::Model,
    invoice: invoices::Model,
    details: &PaymentDetails,
    now: DateTime<Utc>,
) -> CoreResult<transactions::Model> {
    let orders = commerce_db::get_orders_for_payment(conn, payment.id).await?;

    for order in &orders {
        for item in commerce_db::get_order_items(conn, order.id).await? {
            debit_stock(conn, item.product_id, item.quantity).await?;
        }
    }
    for order in orders.iter().cloned() {
        commerce_db::update_order_status(conn, order, orders::Status::Paid).await?;
    }

    let payment = commerce_db::update_payment_status(
        conn,
        payment,
        ecommerce_payments::Status::Paid,
        Some(now),
    )
    .await?;
    info!(payment_id = %payment.id, orders = orders.len(), "E-commerce payment settled");

    let shares = seller_shares(policy, &orders, invoice.amount);
    open_escrow(conn, invoice, shares, details, now).await
}

/// `stock -= qty` and release the matching reservation, clamping at zero.
async fn debit_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: uuid::Uuid,
    quantity: i32,
) -> CoreResult<()> {
    let Some(product) = commerce_db::lock_product(conn, product_id).await? else {
        error!(product_id = %product_id, "Paid order references a missing product");
        return Ok(());
    };

    let mut stock = product.stock - quantity;
    if stock < 0 {
        error!(
            product_id = %product_id,
            stock = product.stock,
            quantity,
            "Stock debit clamped at zero"
        );
        stock = 0;
    }
    let mut reserved = product.reserved_stock - quantity;
    if reserved < 0 {
        error!(
            product_id = %product_id,
            reserved_stock = product.reserved_stock,
            quantity,
            "Reservation release clamped at zero"
        );
        reserved = 0;
    }

    commerce_db::update_stock_levels(conn, product, stock, reserved.min(stock)).await?;
    Ok(())
}

/// Give back a reservation without touching stock.
async fn release_reservation<C: ConnectionTrait>(
    conn: &C,
    product_id: uuid::Uuid,
    quantity: i32,
) -> CoreResult<()> {
    if let Some(product) = commerce_db::lock_product(conn, product_id).await? {
        let stock = product.stock;
        let reserved = (product.reserved_stock - quantity).max(0);
        commerce_db::update_stock_levels(conn, product, stock, reserved).await?;
    }
    Ok(())
}

/// Failed or expired project/delivery invoice.
pub async fn fail_invoice<C: ConnectionTrait>(
    conn: &C,
    invoice: invoices::Model,
) -> CoreResult<invoices::Model> {
    let invoice = invoice_db::mark_invoice_failed(conn, invoice).await?;
    info!(invoice_id = %invoice.id, obligation = ?invoice.obligation_type, "Invoice failed");
    Ok(invoice)
}

/// Failed or expired e-commerce payment: orders cancelled, reservations
/// released, its invoice failed.
pub async fn fail_payment<C: ConnectionTrait>(
    conn: &C,
    payment: ecommerce_payments::Model,
    invoice: Option<invoices::Model>,
) -> CoreResult<ecommerce_payments::Model> {
    let orders = commerce_db::get_orders_for_payment(conn, payment.id).await?;
    for order in orders {
        for item in commerce_db::get_order_items(conn, order.id).await? {
            release_reservation(conn, item.product_id, item.quantity).await?;
        }
        commerce_db::update_order_status(conn, order, orders::Status::Cancelled).await?;
    }

    if let Some(invoice) = invoice {
        fail_invoice(conn, invoice).await?;
    }

    let payment =
        commerce_db::update_payment_status(conn, payment, ecommerce_payments::Status::Failed, None)
            .await?;
    info!(payment_id = %payment.id, "E-commerce payment failed, reservations released");
    Ok(payment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn order(total: i64) -> orders::Model {
        orders::Model {
            id: Uuid::new_v4(),
            invoice_number: "INV-20250601-AAAAAAAA".into(),
            seller_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            total_amount: Money(total),
            status: orders::Status::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_seller_shares_sum_to_invoice_base() {
        let policy = InvoicePolicy {
            fee_bps: 500,
            timeout: Duration::hours(48),
        };
        let orders = vec![order(30), order(50)];
        let shares = seller_shares(&policy, &orders, Money(76));
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].amount, Money(28));
        assert_eq!(shares[1].amount, Money(48));
        assert_eq!(shares.iter().map(|s| s.amount).sum::<Money>(), Money(76));
        assert!(shares.iter().all(|s| s.payee_type == PayeeType::Seller));
    }
}
