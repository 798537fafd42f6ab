use crate::domain::{AccessDenied, User, authorize_subject};

/// Who is acting, and on whose data. Passed explicitly into every service
/// operation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    actor: User,
    subject: User,
}

impl RequestContext {
    /// The actor works on their own data.
    pub fn new(actor: User) -> Self {
        Self {
            subject: actor.clone(),
            actor,
        }
    }

    /// The actor works on `subject`'s data. Only admins may do this for
    /// someone other than themselves.
    pub fn on_behalf_of(actor: User, subject: User) -> Result<Self, AccessDenied> {
        authorize_subject(&actor, &subject)?;
        Ok(Self { actor, subject })
    }

    pub fn actor(&self) -> &User {
        &self.actor
    }

    pub fn subject(&self) -> &User {
        &self.subject
    }
}
