use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, web};
use agrimarket_backend::auth::middleware::JwtSecret;
use agrimarket_backend::config::Config;
use agrimarket_backend::create_pool;
use agrimarket_backend::gateway::SnapGateway;
use agrimarket_backend::handlers;
use agrimarket_backend::services::contracts::ContractEngine;
use agrimarket_backend::services::invoices::{InvoiceEngine, InvoicePolicy};
use agrimarket_backend::services::payments::{PaymentOrchestrator, sweeper};
use migration::{Migrator, MigratorTrait};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let db = create_pool(&config)
        .await
        .expect("Failed to connect to the database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to apply migrations");
    tracing::info!("Database migrations applied");

    let invoices = InvoiceEngine::new(InvoicePolicy::from_config(&config));
    let contracts = ContractEngine::new(invoices.clone());
    let gateway = SnapGateway::from_config(&config).expect("Failed to build gateway client");
    let orchestrator = web::Data::new(PaymentOrchestrator::new(gateway, invoices.clone()));

    let _sweeper = sweeper::spawn_sweeper(db.clone(), config.sweeper_interval);

    let db_data = web::Data::new(db);
    let invoices_data = web::Data::new(invoices);
    let contracts_data = web::Data::new(contracts);
    let jwt_secret = web::Data::new(JwtSecret(config.jwt_secret.clone()));

    std::fs::create_dir_all(&config.upload_path)?;
    let upload_path = config.upload_path.clone();

    let bind_addr = format!("0.0.0.0:{}", config.server_port);
    tracing::info!(
        gateway_env = ?config.gateway_env,
        fee_bps = config.platform_fee_bps,
        "Server running at http://{bind_addr}"
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(db_data.clone())
            .app_data(invoices_data.clone())
            .app_data(contracts_data.clone())
            .app_data(orchestrator.clone())
            .app_data(jwt_secret.clone())
            .service(web::scope("/api").configure(handlers::init_routes::<SnapGateway>))
            .service(Files::new("/uploads", &upload_path))
    })
    .bind(&bind_addr)?
    .run()
    .await
}
