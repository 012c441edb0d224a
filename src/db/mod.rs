pub mod commerce;
pub mod contracts;
pub mod deliveries;
pub mod invoices;
pub mod ledger;
pub mod projects;
pub mod users;
pub mod webhook_logs;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use crate::config::Config;

/// Create a SeaORM database connection pool from the loaded configuration.
pub async fn create_pool(config: &Config) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.db_max_connections)
        .sqlx_logging(false);

    tracing::info!(url = %config.database_url_masked(), "Connecting to database");
    Database::connect(options).await
}
