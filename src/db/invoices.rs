use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use uuid::Uuid;

use crate::models::invoices::{self, Obligation, ObligationType, Status};
use crate::money::Money;

/// Fields of an invoice about to be issued.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub obligation: Obligation,
    pub attempt: i32,
    pub payer_id: Uuid,
    pub amount: Money,
    pub platform_fee: Money,
    pub due_date: DateTime<Utc>,
}

/// Insert an invoice unless one already exists for the same
/// `(obligation_type, obligation_id, attempt)`. Returns whether a row was written.
pub async fn insert_invoice_if_absent<C: ConnectionTrait>(
    conn: &C,
    input: NewInvoice,
) -> Result<bool, DbErr> {
    let now = Utc::now();
    let Obligation { kind, id } = input.obligation;
    let invoice = invoices::ActiveModel {
        id: Set(Uuid::new_v4()),
        obligation_type: Set(kind),
        obligation_id: Set(id),
        attempt: Set(input.attempt),
        project_id: Set((kind == ObligationType::Project).then_some(id)),
        delivery_id: Set((kind == ObligationType::Delivery).then_some(id)),
        payment_id: Set((kind == ObligationType::Ecommerce).then_some(id)),
        payer_id: Set(input.payer_id),
        amount: Set(input.amount),
        platform_fee: Set(input.platform_fee),
        total_amount: Set(input.amount + input.platform_fee),
        status: Set(Status::Pending),
        due_date: Set(input.due_date),
        snap_token: Set(None),
        redirect_url: Set(None),
        paid_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let result = invoices::Entity::insert(invoice)
        .on_conflict(
            OnConflict::columns([
                invoices::Column::ObligationType,
                invoices::Column::ObligationId,
                invoices::Column::Attempt,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await;

    match result {
        Ok(rows) => Ok(rows > 0),
        Err(DbErr::RecordNotInserted) => Ok(false),
        Err(e) => Err(e),
    }
}

pub async fn get_invoice_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<invoices::Model>, DbErr> {
    invoices::Entity::find_by_id(id).one(conn).await
}

pub async fn lock_invoice<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<invoices::Model>, DbErr> {
    invoices::Entity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
}

/// The most recent attempt for an obligation.
pub async fn latest_invoice_for<C: ConnectionTrait>(
    conn: &C,
    obligation: Obligation,
) -> Result<Option<invoices::Model>, DbErr> {
    invoices::Entity::find()
        .filter(invoices::Column::ObligationType.eq(obligation.kind))
        .filter(invoices::Column::ObligationId.eq(obligation.id))
        .order_by_desc(invoices::Column::Attempt)
        .one(conn)
        .await
}

/// Every invoice ever issued for an obligation, first attempt first.
pub async fn list_invoices_for<C: ConnectionTrait>(
    conn: &C,
    obligation: Obligation,
) -> Result<Vec<invoices::Model>, DbErr> {
    invoices::Entity::find()
        .filter(invoices::Column::ObligationType.eq(obligation.kind))
        .filter(invoices::Column::ObligationId.eq(obligation.id))
        .order_by_asc(invoices::Column::Attempt)
        .all(conn)
        .await
}

pub async fn lock_pending_invoice_for<C: ConnectionTrait>(
    conn: &C,
    obligation: Obligation,
) -> Result<Option<invoices::Model>, DbErr> {
    invoices::Entity::find()
        .filter(invoices::Column::ObligationType.eq(obligation.kind))
        .filter(invoices::Column::ObligationId.eq(obligation.id))
        .filter(invoices::Column::Status.eq(Status::Pending))
        .lock_exclusive()
        .one(conn)
        .await
}

/// IDs of pending invoices whose due date lies strictly before `now`.
pub async fn list_overdue_invoice_ids<C: ConnectionTrait>(
    conn: &C,
    now: DateTime<Utc>,
) -> Result<Vec<Uuid>, DbErr> {
    invoices::Entity::find()
        .select_only()
        .column(invoices::Column::Id)
        .filter(invoices::Column::Status.eq(Status::Pending))
        .filter(invoices::Column::DueDate.lt(now))
        .order_by_asc(invoices::Column::DueDate)
        .into_tuple()
        .all(conn)
        .await
}

/// Remember the gateway session so a retried initiate can resume it.
pub async fn store_session<C: ConnectionTrait>(
    conn: &C,
    invoice: invoices::Model,
    snap_token: String,
    redirect_url: String,
) -> Result<invoices::Model, DbErr> {
    let mut active: invoices::ActiveModel = invoice.into();
    active.snap_token = Set(Some(snap_token));
    active.redirect_url = Set(Some(redirect_url));
    active.updated_at = Set(Utc::now());
    active.update(conn).await
}

pub async fn mark_invoice_paid<C: ConnectionTrait>(
    conn: &C,
    invoice: invoices::Model,
    paid_at: DateTime<Utc>,
) -> Result<invoices::Model, DbErr> {
    let mut active: invoices::ActiveModel = invoice.into();
    active.status = Set(Status::Paid);
    active.paid_at = Set(Some(paid_at));
    active.updated_at = Set(paid_at);
    active.update(conn).await
}

pub async fn mark_invoice_failed<C: ConnectionTrait>(
    conn: &C,
    invoice: invoices::Model,
) -> Result<invoices::Model, DbErr> {
    let mut active: invoices::ActiveModel = invoice.into();
    active.status = Set(Status::Failed);
    active.updated_at = Set(Utc::now());
    active.update(conn).await
}
