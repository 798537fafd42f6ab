use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{LeaveRegistration, UserId};

/// Leave is counted in whole hours. Signed: corrections may be negative.
pub type Hours = i64;

/// Bounds for a single stored hours value.
pub const MAX_HOURS: Hours = i32::MAX as Hours;
pub const MIN_HOURS: Hours = i32::MIN as Hours;

pub type Year = i32;

pub type EntitlementId = Uuid;

/// Remainders at or above this many hours are comfortably positive.
pub const PLENTY_THRESHOLD: Hours = 25;

/// A user's allotted leave hours for one calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub id: EntitlementId,
    pub user_id: UserId,
    pub year: Year,
    pub leave_hours: Hours,
    pub created_at: DateTime<Utc>,
}

impl Entitlement {
    pub fn new(user_id: UserId, year: Year, leave_hours: Hours) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            year,
            leave_hours,
            created_at: Utc::now(),
        }
    }

    pub fn label(&self, username: &str) -> String {
        format!("<Entitlement user={} year={}>", username, self.year)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemainderStatus {
    /// More hours used than allotted
    Over,
    /// Running low
    Warning,
    /// Comfortably positive
    Plenty,
}

impl RemainderStatus {
    pub fn classify(remainder_hours: Hours) -> Self {
        if remainder_hours < 0 {
            RemainderStatus::Over
        } else if remainder_hours >= PLENTY_THRESHOLD {
            RemainderStatus::Plenty
        } else {
            RemainderStatus::Warning
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RemainderStatus::Over => "over",
            RemainderStatus::Warning => "warning",
            RemainderStatus::Plenty => "plenty",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            RemainderStatus::Over => "red",
            RemainderStatus::Warning => "orange",
            RemainderStatus::Plenty => "green",
        }
    }
}

impl std::fmt::Display for RemainderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An entitlement annotated with what has been used from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementSummary {
    pub entitlement: Entitlement,
    pub used_hours: Hours,
    pub remainder_hours: Hours,
    pub status: RemainderStatus,
}

impl EntitlementSummary {
    pub fn new(entitlement: Entitlement, used_hours: Hours) -> Self {
        let remainder_hours = entitlement.leave_hours.saturating_sub(used_hours);
        Self {
            entitlement,
            used_hours,
            remainder_hours,
            status: RemainderStatus::classify(remainder_hours),
        }
    }
}

/// Sum of hours booked against one entitlement. Zero when nothing is booked.
pub fn used_hours(entitlement_id: EntitlementId, registrations: &[LeaveRegistration]) -> Hours {
    registrations
        .iter()
        .filter(|r| r.entitlement_id == entitlement_id)
        .fold(0, |total: Hours, r| total.saturating_add(r.amount_of_hours))
}

pub fn summarize(entitlement: Entitlement, registrations: &[LeaveRegistration]) -> EntitlementSummary {
    let used = used_hours(entitlement.id, registrations);
    EntitlementSummary::new(entitlement, used)
}

/// Pick the entitlement to show first: the one for `current_year` if it
/// exists, otherwise the most recent one.
pub fn default_entitlement(
    entitlements: &[Entitlement],
    current_year: Year,
) -> Option<&Entitlement> {
    entitlements
        .iter()
        .find(|e| e.year == current_year)
        .or_else(|| entitlements.iter().max_by_key(|e| e.year))
}
