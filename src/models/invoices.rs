use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ObligationType {
    #[sea_orm(string_value = "project")]
    Project,
    #[sea_orm(string_value = "delivery")]
    Delivery,
    #[sea_orm(string_value = "ecommerce")]
    Ecommerce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// SeaORM entity for the `invoices` table.
///
/// `total_amount = amount + platform_fee` always holds.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub obligation_type: ObligationType,
    pub obligation_id: Uuid,
    pub attempt: i32,
    pub project_id: Option<Uuid>,
    pub delivery_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub payer_id: Uuid,
    pub amount: Money,
    pub platform_fee: Money,
    pub total_amount: Money,
    pub status: Status,
    pub due_date: DateTimeUtc,
    pub snap_token: Option<String>,
    pub redirect_url: Option<String>,
    pub paid_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn obligation(&self) -> Obligation {
        Obligation {
            kind: self.obligation_type,
            id: self.obligation_id,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::transactions::Entity")]
    Transaction,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// The thing an invoice settles: a project, a delivery or an e-commerce payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    pub kind: ObligationType,
    pub id: Uuid,
}

impl Obligation {
    pub fn project(id: Uuid) -> Self {
        Self {
            kind: ObligationType::Project,
            id,
        }
    }

    pub fn delivery(id: Uuid) -> Self {
        Self {
            kind: ObligationType::Delivery,
            id,
        }
    }

    pub fn ecommerce(id: Uuid) -> Self {
        Self {
            kind: ObligationType::Ecommerce,
            id,
        }
    }
}
