use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::models::users::BankInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum PayeeType {
    #[sea_orm(string_value = "worker")]
    Worker,
    #[sea_orm(string_value = "driver")]
    Driver,
    #[sea_orm(string_value = "seller")]
    Seller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[sea_orm(string_value = "pending_disbursement")]
    PendingDisbursement,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// SeaORM entity for the `payouts` table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payouts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub payee_id: Uuid,
    pub payee_type: PayeeType,
    pub amount: Money,
    pub status: Status,
    pub released_at: DateTimeUtc,
    pub transfer_proof_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub failure_reason: Option<String>,
    /// Admin who finalized the payout.
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id"
    )]
    Transaction,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::PayeeId",
        to = "super::users::Column::Id"
    )]
    Payee,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payee.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// ── DTOs ──

/// A pending payout with everything an admin needs to make the transfer.
#[derive(Debug, Clone, Serialize)]
pub struct PendingPayout {
    #[serde(flatten)]
    pub payout: Model,
    pub payee_name: String,
    pub bank: BankInfo,
    /// Project title, delivery description or order invoice number.
    pub context: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletePayout {
    pub proof_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FailPayout {
    pub reason: String,
}
