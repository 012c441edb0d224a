use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::auth::authorization::require_admin;
use crate::auth::middleware::AuthenticatedUser;
use crate::error::CoreError;
use crate::models::payouts::{CompletePayout, FailPayout};
use crate::services::payouts;

/// GET /api/admin/payouts: everything awaiting a manual transfer.
pub async fn get_pending_payouts(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, CoreError> {
    require_admin(&user.0)?;
    let pending = payouts::list_pending(db.get_ref()).await?;
    Ok(HttpResponse::Ok().json(pending))
}

/// POST /api/admin/payouts/{id}/complete: `{ "proof_url": "https://…" }`
pub async fn complete_payout(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    body: web::Json<CompletePayout>,
) -> Result<HttpResponse, CoreError> {
    let payout = payouts::mark_completed(
        db.get_ref(),
        path.into_inner(),
        &user.0,
        body.into_inner().proof_url,
    )
    .await?;
    Ok(HttpResponse::Ok().json(payout))
}

pub async fn fail_payout(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    body: web::Json<FailPayout>,
) -> Result<HttpResponse, CoreError> {
    let payout = payouts::mark_failed(
        db.get_ref(),
        path.into_inner(),
        &user.0,
        body.into_inner().reason,
    )
    .await?;
    Ok(HttpResponse::Ok().json(payout))
}
