use chrono::Utc;
use sea_orm::*;
use uuid::Uuid;

use crate::models::deliveries::{self, CreateDelivery, Status};

/// Insert a new delivery awaiting a driver.
pub async fn insert_delivery<C: ConnectionTrait>(
    conn: &C,
    farmer_id: Uuid,
    tracking_code: String,
    input: CreateDelivery,
) -> Result<deliveries::Model, DbErr> {
    let now = Utc::now();
    let delivery = deliveries::ActiveModel {
        id: Set(Uuid::new_v4()),
        farmer_id: Set(farmer_id),
        driver_id: Set(None),
        contract_id: Set(None),
        tracking_code: Set(tracking_code),
        pickup_address: Set(input.pickup.address),
        pickup_lat: Set(input.pickup.lat),
        pickup_lng: Set(input.pickup.lng),
        destination_address: Set(input.destination.address),
        destination_lat: Set(input.destination.lat),
        destination_lng: Set(input.destination.lng),
        item_description: Set(input.item_description),
        item_weight: Set(input.item_weight),
        price: Set(input.price),
        status: Set(Status::PendingDriver),
        created_at: Set(now),
        updated_at: Set(now),
    };

    delivery.insert(conn).await
}

pub async fn get_delivery_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<deliveries::Model>, DbErr> {
    deliveries::Entity::find_by_id(id).one(conn).await
}

pub async fn get_deliveries_by_ids<C: ConnectionTrait>(
    conn: &C,
    ids: Vec<Uuid>,
) -> Result<Vec<deliveries::Model>, DbErr> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    deliveries::Entity::find()
        .filter(deliveries::Column::Id.is_in(ids))
        .all(conn)
        .await
}

pub async fn lock_delivery<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<deliveries::Model>, DbErr> {
    deliveries::Entity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
}

/// Attach the chosen driver and their contract; the delivery now waits for the
/// driver's signature.
pub async fn assign_driver<C: ConnectionTrait>(
    conn: &C,
    delivery: deliveries::Model,
    driver_id: Uuid,
    contract_id: Uuid,
) -> Result<deliveries::Model, DbErr> {
    let mut active: deliveries::ActiveModel = delivery.into();
    active.driver_id = Set(Some(driver_id));
    active.contract_id = Set(Some(contract_id));
    active.status = Set(Status::PendingSignature);
    active.updated_at = Set(Utc::now());
    active.update(conn).await
}

pub async fn update_delivery_status<C: ConnectionTrait>(
    conn: &C,
    delivery: deliveries::Model,
    status: Status,
) -> Result<deliveries::Model, DbErr> {
    let mut active: deliveries::ActiveModel = delivery.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.update(conn).await
}
