use tillpoint_core::UserId;

use crate::{permissions_for, Permission, Role};

/// An authenticated staff member, resolved from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            permissions: permissions_for(role),
        }
    }
}
