use std::collections::HashMap;

use sea_orm::*;
use uuid::Uuid;

use crate::models::users::{self, Roles};

/// Insert a user row. Identity lives elsewhere; this exists for seeding.
pub async fn insert_user<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    name: &str,
    role: Roles,
) -> Result<users::Model, DbErr> {
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        name: Set(name.to_string()),
        phone: Set(None),
        role: Set(role),
        bank_name: Set(None),
        bank_account_number: Set(None),
        bank_account_name: Set(None),
        created_at: Set(chrono::Utc::now()),
        updated_at: Set(None),
    };

    user.insert(conn).await
}

/// Fetch a single user by ID.
pub async fn get_user_by_id<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find_by_id(id).one(conn).await
}

/// Fetch several users at once, keyed by ID.
pub async fn get_users_by_ids<C: ConnectionTrait>(
    conn: &C,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<HashMap<Uuid, users::Model>, DbErr> {
    let ids: Vec<Uuid> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = users::Entity::find()
        .filter(users::Column::Id.is_in(ids))
        .all(conn)
        .await?;

    Ok(rows.into_iter().map(|u| (u.id, u)).collect())
}

/// `SELECT … FOR UPDATE` on a user row; serializes hiring decisions per worker.
pub async fn lock_user<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await
}
