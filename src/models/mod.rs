pub mod cart_items;
pub mod contracts;
pub mod deliveries;
pub mod ecommerce_payments;
pub mod invoices;
pub mod order_items;
pub mod orders;
pub mod payment_orders;
pub mod payouts;
pub mod platform_profits;
pub mod products;
pub mod project_applications;
pub mod project_assignments;
pub mod projects;
pub mod transactions;
pub mod users;
pub mod webhook_logs;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PaginationQuery {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(20).min(100)
    }
}
