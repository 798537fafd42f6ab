use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use super::{Hours, MAX_HOURS, MIN_HOURS, Year};

/// Date format accepted for leave periods.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// User-correctable validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Enter a valid date for {field} (YYYY-MM-DD)")]
    DateFormat { field: &'static str },

    #[error("A registration covers one calendar year; start and end date must fall in the same year")]
    CrossYear { from_year: Year, end_year: Year },

    #[error("The end date lies before the start date")]
    Ordering,

    #[error("Year {year} is not (yet) available")]
    NoEntitlement { year: Year },

    #[error("Leave hours for {year} have already been entered")]
    DuplicateYear { year: Year },

    #[error("{hours} hours is out of range for a single entry")]
    HoursOutOfRange { hours: Hours },
}

/// Raw leave registration fields as submitted by a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaveRegistrationInput {
    pub from_date: Option<String>,
    pub end_date: Option<String>,
    pub amount_of_hours: Hours,
}

impl LeaveRegistrationInput {
    pub fn new(from_date: impl Into<String>, end_date: impl Into<String>, hours: Hours) -> Self {
        Self {
            from_date: Some(from_date.into()),
            end_date: Some(end_date.into()),
            amount_of_hours: hours,
        }
    }
}

/// Leave registration fields that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidLeaveRegistration {
    pub from_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount_of_hours: Hours,
}

impl ValidLeaveRegistration {
    pub fn year(&self) -> Year {
        self.from_date.year()
    }
}

pub fn parse_date(field: &'static str, value: Option<&str>) -> Result<NaiveDate, ValidationError> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
        .ok_or(ValidationError::DateFormat { field })
}

/// Validate a candidate registration against the years the user holds an
/// entitlement for. Checks run in a fixed order: date format, same year,
/// ordering, entitlement membership, hours range.
pub fn validate_leave_registration(
    input: &LeaveRegistrationInput,
    entitlement_years: &BTreeSet<Year>,
) -> Result<ValidLeaveRegistration, ValidationError> {
    let from_date = parse_date("from_date", input.from_date.as_deref())?;
    let end_date = parse_date("end_date", input.end_date.as_deref())?;

    let (from_year, end_year) = (from_date.year(), end_date.year());
    if from_year != end_year {
        return Err(ValidationError::CrossYear { from_year, end_year });
    }
    if end_date < from_date {
        return Err(ValidationError::Ordering);
    }
    if !entitlement_years.contains(&from_year) {
        return Err(ValidationError::NoEntitlement { year: from_year });
    }
    let amount_of_hours = validate_hours(input.amount_of_hours)?;

    Ok(ValidLeaveRegistration {
        from_date,
        end_date,
        amount_of_hours,
    })
}

/// Hours are stored as 32-bit integers; sums and remainders are computed wider.
pub fn validate_hours(hours: Hours) -> Result<Hours, ValidationError> {
    if (MIN_HOURS..=MAX_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(ValidationError::HoursOutOfRange { hours })
    }
}

/// Reject a year the user already holds an entitlement for.
pub fn validate_entitlement_year(
    year: Year,
    existing_years: &BTreeSet<Year>,
) -> Result<Year, ValidationError> {
    if existing_years.contains(&year) {
        Err(ValidationError::DuplicateYear { year })
    } else {
        Ok(year)
    }
}
