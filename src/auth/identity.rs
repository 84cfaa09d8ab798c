use serde::Serialize;

use crate::{OrganizationId, Role, User, UserID};

/// The server-verified caller of a request.
///
/// Built by the auth middleware from the database, so handlers can trust
/// every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// The logged-in user.
    pub user_id: UserID,
    /// The organization the user belongs to.
    pub organization_id: OrganizationId,
    /// What the user may see in their organization.
    pub role: Role,
}

impl Identity {
    /// Whether the caller can see every expense in their organization.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            organization_id: user.organization_id,
            role: user.role,
        }
    }
}
