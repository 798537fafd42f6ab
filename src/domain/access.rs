use thiserror::Error;

use super::{Capability, User};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("User {0} is not active")]
    Inactive(String),

    #[error("User {username} lacks permission: {capability}")]
    MissingCapability {
        username: String,
        capability: Capability,
    },

    #[error("User {0} may not act on behalf of other users")]
    NotAdmin(String),
}

/// Check that `actor` holds `capability`. Called at the top of every
/// operation, before any data is read or written.
pub fn authorize(actor: &User, capability: Capability) -> Result<(), AccessDenied> {
    if !actor.is_active {
        return Err(AccessDenied::Inactive(actor.username.clone()));
    }
    if actor.has_capability(capability) {
        Ok(())
    } else {
        Err(AccessDenied::MissingCapability {
            username: actor.username.clone(),
            capability,
        })
    }
}

/// Check that `actor` may operate on `subject`'s data.
pub fn authorize_subject(actor: &User, subject: &User) -> Result<(), AccessDenied> {
    if !actor.is_active {
        return Err(AccessDenied::Inactive(actor.username.clone()));
    }
    if actor.id == subject.id || actor.is_admin {
        Ok(())
    } else {
        Err(AccessDenied::NotAdmin(actor.username.clone()))
    }
}
