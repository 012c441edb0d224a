use chrono::Utc;
use sea_orm::*;
use uuid::Uuid;

use crate::models::project_applications as applications;
use crate::models::project_assignments as assignments;
use crate::models::projects::{self, CreateProject};
use crate::money::Money;

// ── Projects ──

/// Insert a new project with the given starting status.
pub async fn insert_project<C: ConnectionTrait>(
    conn: &C,
    farmer_id: Uuid,
    input: CreateProject,
    status: projects::Status,
) -> Result<projects::Model, DbErr> {
    let now = Utc::now();
    let project = projects::ActiveModel {
        id: Set(Uuid::new_v4()),
        farmer_id: Set(farmer_id),
        title: Set(input.title),
        description: Set(input.description),
        location: Set(input.location),
        workers_needed: Set(input.workers_needed),
        start_date: Set(input.start_date),
        end_date: Set(input.end_date),
        payment_type: Set(input.payment_type),
        payment_rate: Set(input.payment_rate),
        status: Set(status),
        created_at: Set(now),
        updated_at: Set(now),
    };

    project.insert(conn).await
}

pub async fn get_project_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<projects::Model>, DbErr> {
    projects::Entity::find_by_id(id).one(conn).await
}

pub async fn get_projects_by_ids<C: ConnectionTrait>(
    conn: &C,
    ids: Vec<Uuid>,
) -> Result<Vec<projects::Model>, DbErr> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    projects::Entity::find()
        .filter(projects::Column::Id.is_in(ids))
        .all(conn)
        .await
}

/// `SELECT … FOR UPDATE` on a project row.
pub async fn lock_project<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<projects::Model>, DbErr> {
    projects::Entity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
}

pub async fn update_project_status<C: ConnectionTrait>(
    conn: &C,
    project: projects::Model,
    status: projects::Status,
) -> Result<projects::Model, DbErr> {
    let mut active: projects::ActiveModel = project.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.update(conn).await
}

// ── Applications ──

pub async fn insert_application<C: ConnectionTrait>(
    conn: &C,
    project_id: Uuid,
    worker_id: Uuid,
    message: String,
) -> Result<applications::Model, DbErr> {
    let now = Utc::now();
    let application = applications::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project_id),
        worker_id: Set(worker_id),
        message: Set(message),
        status: Set(applications::Status::Pending),
        created_at: Set(now),
        updated_at: Set(now),
    };

    application.insert(conn).await
}

pub async fn find_application<C: ConnectionTrait>(
    conn: &C,
    project_id: Uuid,
    worker_id: Uuid,
) -> Result<Option<applications::Model>, DbErr> {
    applications::Entity::find()
        .filter(applications::Column::ProjectId.eq(project_id))
        .filter(applications::Column::WorkerId.eq(worker_id))
        .one(conn)
        .await
}

pub async fn get_application_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<applications::Model>, DbErr> {
    applications::Entity::find_by_id(id).one(conn).await
}

pub async fn lock_application<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<applications::Model>, DbErr> {
    applications::Entity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
}

pub async fn update_application_status<C: ConnectionTrait>(
    conn: &C,
    application: applications::Model,
    status: applications::Status,
) -> Result<applications::Model, DbErr> {
    let mut active: applications::ActiveModel = application.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.update(conn).await
}

/// Pending applications of a project, locked.
pub async fn lock_pending_applications<C: ConnectionTrait>(
    conn: &C,
    project_id: Uuid,
) -> Result<Vec<applications::Model>, DbErr> {
    applications::Entity::find()
        .filter(applications::Column::ProjectId.eq(project_id))
        .filter(applications::Column::Status.eq(applications::Status::Pending))
        .lock_exclusive()
        .all(conn)
        .await
}

// ── Assignments ──

pub async fn insert_assignment<C: ConnectionTrait>(
    conn: &C,
    project_id: Uuid,
    worker_id: Uuid,
    contract_id: Uuid,
    agreed_rate: Money,
) -> Result<assignments::Model, DbErr> {
    let now = Utc::now();
    let assignment = assignments::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project_id),
        worker_id: Set(worker_id),
        contract_id: Set(contract_id),
        agreed_rate: Set(agreed_rate),
        status: Set(assignments::Status::Assigned),
        created_at: Set(now),
        updated_at: Set(now),
    };

    assignment.insert(conn).await
}

pub async fn get_assignment_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<assignments::Model>, DbErr> {
    assignments::Entity::find_by_id(id).one(conn).await
}

pub async fn lock_assignment<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<assignments::Model>, DbErr> {
    assignments::Entity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
}

/// Assignments of a project that were not terminated, oldest first.
pub async fn list_staffed_assignments<C: ConnectionTrait>(
    conn: &C,
    project_id: Uuid,
) -> Result<Vec<assignments::Model>, DbErr> {
    assignments::Entity::find()
        .filter(assignments::Column::ProjectId.eq(project_id))
        .filter(assignments::Column::Status.ne(assignments::Status::Terminated))
        .order_by_asc(assignments::Column::CreatedAt)
        .order_by_asc(assignments::Column::Id)
        .all(conn)
        .await
}

pub async fn count_staffed_assignments<C: ConnectionTrait>(
    conn: &C,
    project_id: Uuid,
) -> Result<u64, DbErr> {
    assignments::Entity::find()
        .filter(assignments::Column::ProjectId.eq(project_id))
        .filter(assignments::Column::Status.ne(assignments::Status::Terminated))
        .count(conn)
        .await
}

/// Number of `assigned`/`started` assignments held by a worker.
pub async fn count_active_assignments_for_worker<C: ConnectionTrait>(
    conn: &C,
    worker_id: Uuid,
) -> Result<u64, DbErr> {
    assignments::Entity::find()
        .filter(assignments::Column::WorkerId.eq(worker_id))
        .filter(assignments::Column::Status.is_in(assignments::Status::ACTIVE))
        .count(conn)
        .await
}

pub async fn update_assignment_status<C: ConnectionTrait>(
    conn: &C,
    assignment: assignments::Model,
    status: assignments::Status,
) -> Result<assignments::Model, DbErr> {
    let mut active: assignments::ActiveModel = assignment.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.update(conn).await
}
