use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    #[sea_orm(string_value = "work")]
    Work,
    #[sea_orm(string_value = "delivery")]
    Delivery,
}

/// Contract status stored as a lowercase string in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[sea_orm(string_value = "pending_signature")]
    PendingSignature,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "terminated")]
    Terminated,
}

/// SeaORM entity for the `contracts` table.
///
/// Exactly one of `project_id`/`delivery_id` is set, matching `contract_type`;
/// the second party is `worker_id` for work contracts and `driver_id` for
/// delivery contracts.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "contracts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub contract_type: ContractType,
    pub project_id: Option<Uuid>,
    pub delivery_id: Option<Uuid>,
    pub farmer_id: Uuid,
    pub worker_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub signed_by_farmer: bool,
    pub signed_by_second_party: bool,
    pub signed_at: Option<DateTimeUtc>,
    pub status: Status,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// The worker or driver expected to counter-sign.
    pub fn second_party(&self) -> Option<Uuid> {
        match self.contract_type {
            ContractType::Work => self.worker_id,
            ContractType::Delivery => self.driver_id,
        }
    }

    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.farmer_id == user_id || self.second_party() == Some(user_id)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::projects::Entity",
        from = "Column::ProjectId",
        to = "super::projects::Column::Id"
    )]
    Project,
    #[sea_orm(
        belongs_to = "super::deliveries::Entity",
        from = "Column::DeliveryId",
        to = "super::deliveries::Column::Id"
    )]
    Delivery,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::FarmerId",
        to = "super::users::Column::Id"
    )]
    Farmer,
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::deliveries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Delivery.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Farmer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// ── DTOs ──

/// A contract with the names needed to render it.
#[derive(Debug, Clone, Serialize)]
pub struct ContractDetails {
    #[serde(flatten)]
    pub contract: Model,
    pub farmer_name: String,
    pub second_party_name: Option<String>,
    pub project_title: Option<String>,
    pub delivery_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeliveryContract {
    pub driver_id: Uuid,
}
