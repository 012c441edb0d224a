use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::PaymentOrchestrator;
use crate::db::{commerce as commerce_db, invoices as invoice_db};
use crate::error::{CoreError, CoreResult};
use crate::gateway::PaymentGateway;
use crate::models::{ecommerce_payments, invoices, orders, products, users};
use crate::money::Money;

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub payment: ecommerce_payments::Model,
    pub orders: Vec<orders::Model>,
    pub invoice: invoices::Model,
    pub snap_token: String,
    pub redirect_url: String,
}

/// `INV-YYYYMMDD-XXXXXXXX`.
pub fn generate_invoice_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("INV-{}-{}", now.format("%Y%m%d"), &suffix[..8])
}

fn subtotal(lines: &[(products::Model, i32)]) -> CoreResult<Money> {
    lines
        .iter()
        .try_fold(Money::ZERO, |acc, (product, qty)| {
            product
                .price
                .checked_mul(i64::from(*qty))
                .and_then(|line| acc.checked_add(line))
        })
        .ok_or_else(|| CoreError::InvalidInput("order total is out of range".to_string()))
}

impl<G: PaymentGateway> PaymentOrchestrator<G> {
    /// Turn the customer's cart into one order per seller, reserve stock and
    /// open the gateway session, all in one transaction.
    pub async fn checkout(
        &self,
        db: &DatabaseConnection,
        customer: &users::Model,
    ) -> CoreResult<CheckoutResult> {
        let txn = db.begin().await?;

        let cart = commerce_db::lock_cart(&txn, customer.id).await?;
        if cart.is_empty() {
            return Err(CoreError::IllegalState("Cart is empty".to_string()));
        }

        let mut by_seller: BTreeMap<Uuid, Vec<(products::Model, i32)>> = BTreeMap::new();
        for item in cart {
            if item.quantity <= 0 {
                return Err(CoreError::InvalidInput(format!(
                    "Cart item {} has a non-positive quantity",
                    item.id
                )));
            }

            let product = commerce_db::lock_product(&txn, item.product_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Product", item.product_id))?;
            if product.available() < item.quantity {
                return Err(CoreError::Conflict(format!(
                    "Insufficient stock for {}",
                    product.name
                )));
            }

            let stock = product.stock;
            let reserved = product.reserved_stock + item.quantity;
            let product = commerce_db::update_stock_levels(&txn, product, stock, reserved).await?;
            by_seller
                .entry(product.farmer_id)
                .or_default()
                .push((product, item.quantity));
        }

        let now = Utc::now();
        let mut orders = Vec::with_capacity(by_seller.len());
        for (seller_id, lines) in by_seller {
            let order = commerce_db::insert_order(
                &txn,
                generate_invoice_number(now),
                seller_id,
                customer.id,
                subtotal(&lines)?,
            )
            .await?;
            for (product, quantity) in &lines {
                commerce_db::insert_order_item(&txn, order.id, product.id, *quantity, product.price)
                    .await?;
            }
            orders.push(order);
        }

        commerce_db::clear_cart(&txn, customer.id).await?;

        let grand_total: Money = orders.iter().map(|o| o.total_amount).sum();
        let payment = commerce_db::insert_payment(&txn, customer.id, grand_total).await?;
        for order in &orders {
            commerce_db::link_payment_order(&txn, payment.id, order.id).await?;
        }
        let invoice = self
            .invoices
            .issue_for_payment(&txn, &payment, &orders)
            .await?;

        let session = self.open_session(payment.id, grand_total, customer).await?;
        let payment = commerce_db::store_payment_session(
            &txn,
            payment,
            session.token.clone(),
            session.redirect_url.clone(),
        )
        .await?;
        let invoice = invoice_db::store_session(
            &txn,
            invoice,
            session.token.clone(),
            session.redirect_url.clone(),
        )
        .await?;

        txn.commit().await?;

        info!(
            payment_id = %payment.id,
            customer_id = %customer.id,
            orders = orders.len(),
            grand_total = %payment.grand_total,
            "Checkout completed"
        );
        Ok(CheckoutResult {
            payment,
            orders,
            invoice,
            snap_token: session.token,
            redirect_url: session.redirect_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_number_format() {
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 6, 1, 8, 30, 0).unwrap();
        let number = generate_invoice_number(now);
        assert!(number.starts_with("INV-20250601-"));
        assert_eq!(number.len(), "INV-20250601-".len() + 8);
        assert!(number[13..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }
}
