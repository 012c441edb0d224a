use chrono::{DateTime, Utc};
use sea_orm::*;
use uuid::Uuid;

use crate::models::{cart_items, ecommerce_payments, order_items, orders, payment_orders, products};
use crate::money::Money;

// ── Products ──

pub async fn insert_product<C: ConnectionTrait>(
    conn: &C,
    farmer_id: Uuid,
    name: &str,
    price: Money,
    stock: i32,
) -> Result<products::Model, DbErr> {
    let now = Utc::now();
    let product = products::ActiveModel {
        id: Set(Uuid::new_v4()),
        farmer_id: Set(farmer_id),
        name: Set(name.to_string()),
        price: Set(price),
        stock: Set(stock),
        reserved_stock: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };

    product.insert(conn).await
}

pub async fn get_product_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<products::Model>, DbErr> {
    products::Entity::find_by_id(id).one(conn).await
}

pub async fn lock_product<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<products::Model>, DbErr> {
    products::Entity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
}

/// Write new `stock`/`reserved_stock` counters on a locked product.
pub async fn update_stock_levels<C: ConnectionTrait>(
    conn: &C,
    product: products::Model,
    stock: i32,
    reserved_stock: i32,
) -> Result<products::Model, DbErr> {
    let mut active: products::ActiveModel = product.into();
    active.stock = Set(stock);
    active.reserved_stock = Set(reserved_stock);
    active.updated_at = Set(Utc::now());
    active.update(conn).await
}

// ── Cart ──

pub async fn insert_cart_item<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> Result<cart_items::Model, DbErr> {
    let item = cart_items::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        product_id: Set(product_id),
        quantity: Set(quantity),
        created_at: Set(Utc::now()),
    };

    item.insert(conn).await
}

/// The user's cart, locked, ordered by product so concurrent checkouts lock
/// products in the same order.
pub async fn lock_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<Vec<cart_items::Model>, DbErr> {
    cart_items::Entity::find()
        .filter(cart_items::Column::UserId.eq(user_id))
        .order_by_asc(cart_items::Column::ProductId)
        .lock_exclusive()
        .all(conn)
        .await
}

pub async fn clear_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<u64, DbErr> {
    cart_items::Entity::delete_many()
        .filter(cart_items::Column::UserId.eq(user_id))
        .exec(conn)
        .await
        .map(|r| r.rows_affected)
}

// ── Orders ──

pub async fn insert_order<C: ConnectionTrait>(
    conn: &C,
    invoice_number: String,
    seller_id: Uuid,
    customer_id: Uuid,
    total_amount: Money,
) -> Result<orders::Model, DbErr> {
    let now = Utc::now();
    let order = orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        invoice_number: Set(invoice_number),
        seller_id: Set(seller_id),
        customer_id: Set(customer_id),
        total_amount: Set(total_amount),
        status: Set(orders::Status::Pending),
        created_at: Set(now),
        updated_at: Set(now),
    };

    order.insert(conn).await
}

pub async fn insert_order_item<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price: Money,
) -> Result<order_items::Model, DbErr> {
    let item = order_items::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        product_id: Set(product_id),
        quantity: Set(quantity),
        price: Set(unit_price),
    };

    item.insert(conn).await
}

pub async fn get_order_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Vec<order_items::Model>, DbErr> {
    order_items::Entity::find()
        .filter(order_items::Column::OrderId.eq(order_id))
        .order_by_asc(order_items::Column::ProductId)
        .all(conn)
        .await
}

pub async fn update_order_status<C: ConnectionTrait>(
    conn: &C,
    order: orders::Model,
    status: orders::Status,
) -> Result<orders::Model, DbErr> {
    let mut active: orders::ActiveModel = order.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.update(conn).await
}

// ── E-commerce payments ──

pub async fn insert_payment<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    grand_total: Money,
) -> Result<ecommerce_payments::Model, DbErr> {
    let now = Utc::now();
    let payment = ecommerce_payments::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        grand_total: Set(grand_total),
        status: Set(ecommerce_payments::Status::Pending),
        snap_token: Set(None),
        redirect_url: Set(None),
        paid_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    payment.insert(conn).await
}

pub async fn link_payment_order<C: ConnectionTrait>(
    conn: &C,
    payment_id: Uuid,
    order_id: Uuid,
) -> Result<(), DbErr> {
    let link = payment_orders::ActiveModel {
        payment_id: Set(payment_id),
        order_id: Set(order_id),
    };

    payment_orders::Entity::insert(link)
        .exec_without_returning(conn)
        .await
        .map(|_| ())
}

pub async fn get_payment_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<ecommerce_payments::Model>, DbErr> {
    ecommerce_payments::Entity::find_by_id(id).one(conn).await
}

pub async fn lock_payment<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<ecommerce_payments::Model>, DbErr> {
    ecommerce_payments::Entity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
}

/// Orders settled by a payment, in seller order.
pub async fn get_orders_for_payment<C: ConnectionTrait>(
    conn: &C,
    payment_id: Uuid,
) -> Result<Vec<orders::Model>, DbErr> {
    let order_ids: Vec<Uuid> = payment_orders::Entity::find()
        .select_only()
        .column(payment_orders::Column::OrderId)
        .filter(payment_orders::Column::PaymentId.eq(payment_id))
        .into_tuple()
        .all(conn)
        .await?;

    orders::Entity::find()
        .filter(orders::Column::Id.is_in(order_ids))
        .order_by_asc(orders::Column::SellerId)
        .order_by_asc(orders::Column::Id)
        .all(conn)
        .await
}

pub async fn store_payment_session<C: ConnectionTrait>(
    conn: &C,
    payment: ecommerce_payments::Model,
    snap_token: String,
    redirect_url: String,
) -> Result<ecommerce_payments::Model, DbErr> {
    let mut active: ecommerce_payments::ActiveModel = payment.into();
    active.snap_token = Set(Some(snap_token));
    active.redirect_url = Set(Some(redirect_url));
    active.updated_at = Set(Utc::now());
    active.update(conn).await
}

pub async fn update_payment_status<C: ConnectionTrait>(
    conn: &C,
    payment: ecommerce_payments::Model,
    status: ecommerce_payments::Status,
    paid_at: Option<DateTime<Utc>>,
) -> Result<ecommerce_payments::Model, DbErr> {
    let mut active: ecommerce_payments::ActiveModel = payment.into();
    active.status = Set(status);
    if paid_at.is_some() {
        active.paid_at = Set(paid_at);
    }
    active.updated_at = Set(Utc::now());
    active.update(conn).await
}
