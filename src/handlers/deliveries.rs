use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::error::CoreError;
use crate::models::contracts::CreateDeliveryContract;
use crate::models::deliveries::CreateDelivery;
use crate::services::contracts::ContractEngine;
use crate::services::{board, lifecycle};

/// POST /api/deliveries
pub async fn create_delivery(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    body: web::Json<CreateDelivery>,
) -> Result<HttpResponse, CoreError> {
    let delivery = board::create_delivery(db.get_ref(), user.0.id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(delivery))
}

/// POST /api/deliveries/{id}/driver: the sender hires a driver. The delivery
/// contract and its invoice are created together.
pub async fn choose_driver(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    engine: web::Data<ContractEngine>,
    path: web::Path<Uuid>,
    body: web::Json<CreateDeliveryContract>,
) -> Result<HttpResponse, CoreError> {
    let created = engine
        .create_delivery_contract(db.get_ref(), path.into_inner(), user.0.id, body.driver_id)
        .await?;
    Ok(HttpResponse::Created().json(created))
}

pub async fn start_delivery(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let delivery = lifecycle::start_delivery(db.get_ref(), path.into_inner(), user.0.id).await?;
    Ok(HttpResponse::Ok().json(delivery))
}

pub async fn mark_delivered(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let delivery = lifecycle::mark_delivered(db.get_ref(), path.into_inner(), user.0.id).await?;
    Ok(HttpResponse::Ok().json(delivery))
}

pub async fn cancel_delivery(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let delivery = lifecycle::cancel_delivery(db.get_ref(), path.into_inner(), user.0.id).await?;
    Ok(HttpResponse::Ok().json(delivery))
}
