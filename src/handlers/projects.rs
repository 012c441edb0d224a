use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::auth::authorization::require_role;
use crate::auth::middleware::AuthenticatedUser;
use crate::error::CoreError;
use crate::models::project_applications::CreateApplication;
use crate::models::projects::{CreateProject, DirectOffer};
use crate::models::users::Roles;
use crate::services::contracts::ContractEngine;
use crate::services::{board, lifecycle};

/// POST /api/projects: a farmer posts an open project.
pub async fn create_project(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    body: web::Json<CreateProject>,
) -> Result<HttpResponse, CoreError> {
    require_role(&user.0, Roles::Farmer)?;
    let project = board::create_project(db.get_ref(), user.0.id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(project))
}

/// POST /api/projects/{id}/applications: a worker applies.
pub async fn apply(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    body: web::Json<CreateApplication>,
) -> Result<HttpResponse, CoreError> {
    require_role(&user.0, Roles::Worker)?;
    let application =
        board::apply(db.get_ref(), path.into_inner(), user.0.id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(application))
}

/// POST /api/projects/{id}/cancel
pub async fn cancel_project(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let project = lifecycle::cancel_project(db.get_ref(), path.into_inner(), user.0.id).await?;
    Ok(HttpResponse::Ok().json(project))
}

/// POST /api/applications/{id}/accept: creates the work contract; issues the
/// invoice when the project becomes fully staffed.
pub async fn accept_application(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    engine: web::Data<ContractEngine>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let accepted = engine
        .accept_application(db.get_ref(), path.into_inner(), user.0.id)
        .await?;
    Ok(HttpResponse::Created().json(accepted))
}

pub async fn reject_application(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let application =
        board::reject_application(db.get_ref(), path.into_inner(), user.0.id).await?;
    Ok(HttpResponse::Ok().json(application))
}

pub async fn withdraw_application(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let application =
        board::withdraw_application(db.get_ref(), path.into_inner(), user.0.id).await?;
    Ok(HttpResponse::Ok().json(application))
}

/// POST /api/direct-offers
pub async fn direct_offer(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    engine: web::Data<ContractEngine>,
    body: web::Json<DirectOffer>,
) -> Result<HttpResponse, CoreError> {
    require_role(&user.0, Roles::Farmer)?;
    let created = engine
        .create_direct_offer(db.get_ref(), user.0.id, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(created))
}

/// POST /api/assignments/{id}/complete
pub async fn complete_assignment(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let (assignment, project) =
        lifecycle::complete_assignment(db.get_ref(), path.into_inner(), user.0.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "assignment": assignment,
        "project": project,
    })))
}
