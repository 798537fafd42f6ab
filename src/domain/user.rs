use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub type UserId = Uuid;

/// A single permission flag. Operations name the capability they need and
/// check it explicitly against the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewEntitlement,
    AddEntitlement,
    ChangeEntitlement,
    DeleteEntitlement,
    AddLeaveRegistration,
    ChangeLeaveRegistration,
    DeleteLeaveRegistration,
    ViewUser,
    ManageUsers,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Capability::ViewEntitlement,
        Capability::AddEntitlement,
        Capability::ChangeEntitlement,
        Capability::DeleteEntitlement,
        Capability::AddLeaveRegistration,
        Capability::ChangeLeaveRegistration,
        Capability::DeleteLeaveRegistration,
        Capability::ViewUser,
        Capability::ManageUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewEntitlement => "view_entitlement",
            Capability::AddEntitlement => "add_entitlement",
            Capability::ChangeEntitlement => "change_entitlement",
            Capability::DeleteEntitlement => "delete_entitlement",
            Capability::AddLeaveRegistration => "add_leave_registration",
            Capability::ChangeLeaveRegistration => "change_leave_registration",
            Capability::DeleteLeaveRegistration => "delete_leave_registration",
            Capability::ViewUser => "view_user",
            Capability::ManageUsers => "manage_users",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase().replace('-', "_");
        Capability::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// What a regular employee gets: read their own entitlements and keep
    /// their own leave registrations.
    pub fn employee_defaults() -> BTreeSet<Capability> {
        BTreeSet::from([
            Capability::ViewEntitlement,
            Capability::AddLeaveRegistration,
            Capability::ChangeLeaveRegistration,
            Capability::DeleteLeaveRegistration,
        ])
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_active: bool,
    /// Admins hold every capability regardless of `permissions`.
    pub is_admin: bool,
    pub permissions: BTreeSet<Capability>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            is_active: true,
            is_admin: false,
            permissions: Capability::employee_defaults(),
            created_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_permissions(mut self, permissions: BTreeSet<Capability>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn as_admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.is_active && (self.is_admin || self.permissions.contains(&capability))
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}
