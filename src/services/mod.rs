//! The financial core. Handlers are thin wrappers around these.

pub mod board;
pub mod contracts;
pub mod inventory;
pub mod invoices;
pub mod lifecycle;
pub mod payments;
pub mod payouts;
