pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_users_table;
mod m20250601_000002_create_projects_tables;
mod m20250601_000003_create_deliveries_table;
mod m20250601_000004_create_contracts_tables;
mod m20250601_000005_create_commerce_tables;
mod m20250601_000006_create_invoices_table;
mod m20250601_000007_create_ledger_tables;
mod m20250601_000008_create_webhook_logs_table;
mod m20250601_000009_add_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_users_table::Migration),
            Box::new(m20250601_000002_create_projects_tables::Migration),
            Box::new(m20250601_000003_create_deliveries_table::Migration),
            Box::new(m20250601_000004_create_contracts_tables::Migration),
            Box::new(m20250601_000005_create_commerce_tables::Migration),
            Box::new(m20250601_000006_create_invoices_table::Migration),
            Box::new(m20250601_000007_create_ledger_tables::Migration),
            Box::new(m20250601_000008_create_webhook_logs_table::Migration),
            Box::new(m20250601_000009_add_indexes::Migration),
        ]
    }
}
