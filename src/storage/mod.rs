mod repository;

pub use repository::*;

/// SQL migration for users and entitlements
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// SQL migration for leave registrations
pub const MIGRATION_002_LEAVE_REGISTRATIONS: &str =
    include_str!("migrations/002_leave_registrations.sql");
