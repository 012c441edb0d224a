use actix_web::{HttpRequest, HttpResponse, web};
use sea_orm::DatabaseConnection;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::error::CoreError;
use crate::gateway::PaymentGateway;
use crate::services::invoices::InvoiceEngine;
use crate::services::payments::PaymentOrchestrator;

/// POST /api/invoices/{id}/reissue: new attempt after a failed invoice.
pub async fn reissue_invoice(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    engine: web::Data<InvoiceEngine>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let invoice = engine
        .reissue(db.get_ref(), path.into_inner(), user.0.id)
        .await?;
    Ok(HttpResponse::Created().json(invoice))
}

/// POST /api/payments/{id}/initiate: `id` is an invoice or an e-commerce payment.
pub async fn initiate<G: PaymentGateway + 'static>(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    orchestrator: web::Data<PaymentOrchestrator<G>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let initiated = orchestrator
        .initiate(db.get_ref(), path.into_inner(), &user.0)
        .await?;
    Ok(HttpResponse::Ok().json(initiated))
}

/// POST /api/checkout: the caller's cart becomes orders and one payment.
pub async fn checkout<G: PaymentGateway + 'static>(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    orchestrator: web::Data<PaymentOrchestrator<G>>,
) -> Result<HttpResponse, CoreError> {
    let result = orchestrator.checkout(db.get_ref(), &user.0).await?;
    Ok(HttpResponse::Created().json(result))
}

/// POST /api/payments/webhook: gateway callback, no bearer auth.
///
/// 200 for everything that was logged and handled, 401 for a bad signature,
/// 400 for an unreadable body.
pub async fn webhook<G: PaymentGateway + 'static>(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    orchestrator: web::Data<PaymentOrchestrator<G>>,
    body: web::Bytes,
) -> Result<HttpResponse, CoreError> {
    let raw_body = String::from_utf8_lossy(&body);
    let headers: BTreeMap<String, String> = req
        .headers()
        .iter()
        .filter(|(name, _)| *name != actix_web::http::header::AUTHORIZATION)
        .map(|(name, value)| {
            (
                name.to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    let headers = serde_json::to_string(&headers).unwrap_or_default();

    let ack = orchestrator
        .handle_webhook(db.get_ref(), &raw_body, headers)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": ack })))
}
