use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Join table between `ecommerce_payments` and `orders`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub payment_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ecommerce_payments::Entity",
        from = "Column::PaymentId",
        to = "super::ecommerce_payments::Column::Id"
    )]
    Payment,
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id"
    )]
    Order,
}

impl ActiveModelBehavior for ActiveModel {}
