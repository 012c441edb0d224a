use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::error::CoreError;
use crate::services::contracts::ContractEngine;

/// GET /api/contracts: contracts the caller is party to.
pub async fn get_contracts(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    engine: web::Data<ContractEngine>,
) -> Result<HttpResponse, CoreError> {
    let contracts = engine.list_contracts(db.get_ref(), user.0.id).await?;
    Ok(HttpResponse::Ok().json(contracts))
}

/// GET /api/contracts/{id}: parties and admins only.
pub async fn get_contract(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    engine: web::Data<ContractEngine>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let contract = engine
        .get_contract(db.get_ref(), path.into_inner(), &user.0)
        .await?;
    Ok(HttpResponse::Ok().json(contract))
}

/// POST /api/contracts/{id}/sign: counter-signature by the worker or driver.
pub async fn sign_contract(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    engine: web::Data<ContractEngine>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let signed = engine.sign(db.get_ref(), path.into_inner(), user.0.id).await?;
    Ok(HttpResponse::Ok().json(signed))
}
