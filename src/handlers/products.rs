use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::error::CoreError;
use crate::models::products::UpdateStock;
use crate::services::inventory;

/// PUT /api/products/{id}/stock: owner-only stock correction.
pub async fn update_stock(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateStock>,
) -> Result<HttpResponse, CoreError> {
    let product =
        inventory::update_stock(db.get_ref(), path.into_inner(), user.0.id, body.stock).await?;
    Ok(HttpResponse::Ok().json(product))
}
