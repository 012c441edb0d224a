use crate::error::{CoreError, CoreResult};
use crate::models::users::{Model, Roles};

/// Reject callers whose stored role is not `role`.
pub fn require_role(user: &Model, role: Roles) -> CoreResult<()> {
    if user.role != role {
        return Err(CoreError::Forbidden(format!(
            "This action requires the {role:?} role"
        )));
    }
    Ok(())
}

pub fn require_admin(user: &Model) -> CoreResult<()> {
    require_role(user, Roles::Admin)
}
