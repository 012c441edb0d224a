use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    #[sea_orm(string_value = "per_day")]
    PerDay,
    #[sea_orm(string_value = "lump_sum")]
    LumpSum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "direct_offer")]
    DirectOffer,
    #[sea_orm(string_value = "waiting_payment")]
    WaitingPayment,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl Status {
    /// States from which a project may still be cancelled (nothing paid yet).
    pub fn is_cancellable(self) -> bool {
        matches!(self, Status::Open | Status::DirectOffer | Status::WaitingPayment)
    }
}

/// SeaORM entity for the `projects` table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub location: String,
    pub workers_needed: i32,
    pub start_date: Date,
    pub end_date: Date,
    pub payment_type: PaymentType,
    pub payment_rate: Money,
    pub status: Status,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::project_applications::Entity")]
    Applications,
    #[sea_orm(has_many = "super::project_assignments::Entity")]
    Assignments,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::FarmerId",
        to = "super::users::Column::Id"
    )]
    Farmer,
}

impl Related<super::project_applications::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Applications.def()
    }
}

impl Related<super::project_assignments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignments.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Farmer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// ── DTOs ──

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub workers_needed: i32,
    pub start_date: Date,
    pub end_date: Date,
    pub payment_type: PaymentType,
    pub payment_rate: Money,
}

/// A farmer-initiated offer to one specific worker.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectOffer {
    pub worker_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub start_date: Date,
    pub end_date: Date,
    pub payment_type: PaymentType,
    pub payment_rate: Money,
}
