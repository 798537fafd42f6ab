mod access;
mod entitlement;
mod leave_registration;
mod user;
mod validation;

pub use access::*;
pub use entitlement::*;
pub use leave_registration::*;
pub use user::*;
pub use validation::*;
