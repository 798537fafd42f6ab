use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntitlementId, Hours, ValidLeaveRegistration, Year};

pub type LeaveRegistrationId = Uuid;

/// A recorded leave period consuming hours from an entitlement.
/// Both dates fall in the entitlement's year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRegistration {
    pub id: LeaveRegistrationId,
    pub entitlement_id: EntitlementId,
    pub from_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount_of_hours: Hours,
    pub created_at: DateTime<Utc>,
}

impl LeaveRegistration {
    pub fn new(entitlement_id: EntitlementId, fields: ValidLeaveRegistration) -> Self {
        Self {
            id: Uuid::new_v4(),
            entitlement_id,
            from_date: fields.from_date,
            end_date: fields.end_date,
            amount_of_hours: fields.amount_of_hours,
            created_at: Utc::now(),
        }
    }

    /// Replace the period and hours, moving the registration to the
    /// entitlement of the new year.
    pub fn apply(&mut self, entitlement_id: EntitlementId, fields: ValidLeaveRegistration) {
        self.entitlement_id = entitlement_id;
        self.from_date = fields.from_date;
        self.end_date = fields.end_date;
        self.amount_of_hours = fields.amount_of_hours;
    }

    pub fn year(&self) -> Year {
        self.from_date.year()
    }

    /// Number of calendar days covered, inclusive.
    pub fn days(&self) -> i64 {
        (self.end_date - self.from_date).num_days() + 1
    }
}

impl std::fmt::Display for LeaveRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
