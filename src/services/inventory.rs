use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::info;
use uuid::Uuid;

use crate::db::commerce as commerce_db;
use crate::error::{CoreError, CoreResult};
use crate::models::products;

/// Farmer-side stock correction. Stock can never drop below what open
/// checkouts have reserved.
pub async fn update_stock(
    db: &DatabaseConnection,
    product_id: Uuid,
    farmer_id: Uuid,
    stock: i32,
) -> CoreResult<products::Model> {
    if stock < 0 {
        return Err(CoreError::InvalidInput(
            "stock must not be negative".to_string(),
        ));
    }

    let txn = db.begin().await?;

    let product = commerce_db::lock_product(&txn, product_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Product", product_id))?;

    if product.farmer_id != farmer_id {
        return Err(CoreError::Forbidden(
            "You can only update your own products".to_string(),
        ));
    }
    if stock < product.reserved_stock {
        return Err(CoreError::Conflict(format!(
            "{} units of {} are reserved by pending checkouts",
            product.reserved_stock, product.name
        )));
    }

    let reserved = product.reserved_stock;
    let product = commerce_db::update_stock_levels(&txn, product, stock, reserved).await?;
    txn.commit().await?;

    info!(product_id = %product.id, stock, reserved_stock = reserved, "Stock updated");
    Ok(product)
}
