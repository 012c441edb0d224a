use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[sea_orm(string_value = "pending_driver")]
    PendingDriver,
    #[sea_orm(string_value = "pending_signature")]
    PendingSignature,
    #[sea_orm(string_value = "in_transit")]
    InTransit,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// SeaORM entity for the `deliveries` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deliveries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    #[sea_orm(unique)]
    pub tracking_code: String,
    pub pickup_address: String,
    #[sea_orm(column_type = "Double")]
    pub pickup_lat: f64,
    #[sea_orm(column_type = "Double")]
    pub pickup_lng: f64,
    pub destination_address: String,
    #[sea_orm(column_type = "Double")]
    pub destination_lat: f64,
    #[sea_orm(column_type = "Double")]
    pub destination_lng: f64,
    #[sea_orm(column_type = "Text")]
    pub item_description: String,
    #[sea_orm(column_type = "Double")]
    pub item_weight: f64,
    /// Quoted price of the trip; the invoice base.
    pub price: Money,
    pub status: Status,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::FarmerId",
        to = "super::users::Column::Id"
    )]
    Farmer,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Farmer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// ── DTOs ──

#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDelivery {
    pub pickup: Location,
    pub destination: Location,
    pub item_description: String,
    pub item_weight: f64,
    pub price: Money,
}
