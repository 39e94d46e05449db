//! Explicit caller identity.
//!
//! Every gateway operation takes the acting user as an argument; there is no
//! ambient security context to reach into.

use serde::{Deserialize, Serialize};

use cargoflow_core::{DomainError, DomainResult, UserId};

/// Role of the acting user at the workflow boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Planner,
    Coordinator,
    Driver,
    Admin,
}

/// The acting user: identity plus role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Admin passes every check; everyone else must hold one of the
    /// listed roles.
    pub fn require(&self, allowed: &[Role]) -> DomainResult<()> {
        if self.role == Role::Admin || allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(DomainError::Unauthorized)
        }
    }
}
