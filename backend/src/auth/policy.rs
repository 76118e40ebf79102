//! Authorization policy, independent of HTTP handlers.

use crate::errors::AppError;
use crate::models::{Identity, Role};

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

impl Access {
    /// Turn a denial into a forbidden error carrying `message`.
    pub fn require(self, message: &str) -> Result<(), AppError> {
        match self {
            Access::Allow => Ok(()),
            Access::Deny => Err(AppError::Forbidden(message.to_string())),
        }
    }
}

/// The owner of a resource and administrators may mutate it.
pub fn owner_or_admin(identity: &Identity, owner_id: &str) -> Access {
    if identity.id == owner_id || identity.role == Role::Admin {
        Access::Allow
    } else {
        Access::Deny
    }
}

/// Only administrators pass.
pub fn admin_only(identity: &Identity) -> Access {
    if identity.is_admin() {
        Access::Allow
    } else {
        Access::Deny
    }
}
