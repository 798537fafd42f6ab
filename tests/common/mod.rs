// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use tempfile::TempDir;
use verlof::application::{LeaveService, NewUser, RequestContext};
use verlof::domain::{Hours, LeaveRegistrationInput};

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LeaveService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LeaveService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

pub fn leave(from: &str, to: &str, hours: Hours) -> LeaveRegistrationInput {
    LeaveRegistrationInput::new(from, to, hours)
}

/// Test fixture: an administrator and two employees
pub struct Staff {
    pub admin: RequestContext,
    pub alice: RequestContext,
    pub bob: RequestContext,
}

impl Staff {
    pub async fn create(service: &LeaveService) -> Result<Self> {
        service
            .bootstrap_admin(NewUser {
                username: "employer".into(),
                first_name: "Emma".into(),
                last_name: "Ployer".into(),
                ..Default::default()
            })
            .await?;
        let admin = service.context_for("employer", None).await?;

        for name in ["alice", "bob"] {
            service
                .create_user(
                    &admin,
                    NewUser {
                        username: name.into(),
                        ..Default::default()
                    },
                )
                .await?;
        }

        Ok(Self {
            alice: service.context_for("alice", None).await?,
            bob: service.context_for("bob", None).await?,
            admin,
        })
    }

    /// The administrator working on `username`'s data
    pub async fn admin_for(service: &LeaveService, username: &str) -> Result<RequestContext> {
        Ok(service.context_for("employer", Some(username)).await?)
    }
}
