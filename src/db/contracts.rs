use chrono::Utc;
use sea_orm::*;
use uuid::Uuid;

use crate::models::contracts::{self, ContractType, Status};

/// Insert a work contract. The farmer's acceptance authors it, so it starts
/// signed by the farmer.
pub async fn insert_work_contract<C: ConnectionTrait>(
    conn: &C,
    project_id: Uuid,
    farmer_id: Uuid,
    worker_id: Uuid,
) -> Result<contracts::Model, DbErr> {
    insert_contract(conn, ContractType::Work, farmer_id, |c| {
        c.project_id = Set(Some(project_id));
        c.worker_id = Set(Some(worker_id));
    })
    .await
}

pub async fn insert_delivery_contract<C: ConnectionTrait>(
    conn: &C,
    delivery_id: Uuid,
    farmer_id: Uuid,
    driver_id: Uuid,
) -> Result<contracts::Model, DbErr> {
    insert_contract(conn, ContractType::Delivery, farmer_id, |c| {
        c.delivery_id = Set(Some(delivery_id));
        c.driver_id = Set(Some(driver_id));
    })
    .await
}

async fn insert_contract<C, F>(
    conn: &C,
    contract_type: ContractType,
    farmer_id: Uuid,
    subject: F,
) -> Result<contracts::Model, DbErr>
where
    C: ConnectionTrait,
    F: FnOnce(&mut contracts::ActiveModel),
{
    let now = Utc::now();
    let mut contract = contracts::ActiveModel {
        id: Set(Uuid::new_v4()),
        contract_type: Set(contract_type),
        project_id: Set(None),
        delivery_id: Set(None),
        farmer_id: Set(farmer_id),
        worker_id: Set(None),
        driver_id: Set(None),
        signed_by_farmer: Set(true),
        signed_by_second_party: Set(false),
        signed_at: Set(None),
        status: Set(Status::PendingSignature),
        created_at: Set(now),
        updated_at: Set(now),
    };
    subject(&mut contract);

    contract.insert(conn).await
}

/// Fetch a single contract by ID.
pub async fn get_contract_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<contracts::Model>, DbErr> {
    contracts::Entity::find_by_id(id).one(conn).await
}

pub async fn lock_contract<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<contracts::Model>, DbErr> {
    contracts::Entity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
}

/// Contracts where the user is the farmer, the worker or the driver, newest first.
pub async fn get_contracts_for_party<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<Vec<contracts::Model>, DbErr> {
    contracts::Entity::find()
        .filter(
            Condition::any()
                .add(contracts::Column::FarmerId.eq(user_id))
                .add(contracts::Column::WorkerId.eq(user_id))
                .add(contracts::Column::DriverId.eq(user_id)),
        )
        .order_by_desc(contracts::Column::CreatedAt)
        .all(conn)
        .await
}

/// Work contracts of a project that are still open (`pending_signature` or `active`).
pub async fn lock_open_contracts_for_project<C: ConnectionTrait>(
    conn: &C,
    project_id: Uuid,
) -> Result<Vec<contracts::Model>, DbErr> {
    contracts::Entity::find()
        .filter(contracts::Column::ProjectId.eq(project_id))
        .filter(contracts::Column::Status.is_in([Status::PendingSignature, Status::Active]))
        .lock_exclusive()
        .all(conn)
        .await
}

/// Record the second party's signature and activate the contract.
pub async fn mark_signed<C: ConnectionTrait>(
    conn: &C,
    contract: contracts::Model,
) -> Result<contracts::Model, DbErr> {
    let now = Utc::now();
    let mut active: contracts::ActiveModel = contract.into();
    active.signed_by_second_party = Set(true);
    active.signed_at = Set(Some(now));
    active.status = Set(Status::Active);
    active.updated_at = Set(now);
    active.update(conn).await
}

pub async fn update_contract_status<C: ConnectionTrait>(
    conn: &C,
    contract: contracts::Model,
    status: Status,
) -> Result<contracts::Model, DbErr> {
    let mut active: contracts::ActiveModel = contract.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.update(conn).await
}
