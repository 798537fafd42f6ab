use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::{
    Capability, DATE_FORMAT, Entitlement, EntitlementId, EntitlementSummary, Hours,
    LeaveRegistration, LeaveRegistrationId, User, UserId, Year,
};

use super::{MIGRATION_001_INITIAL, MIGRATION_002_LEAVE_REGISTRATIONS};

const USER_COLUMNS: &str =
    "id, username, first_name, last_name, email, is_active, is_admin, permissions, created_at";

const REGISTRATION_COLUMNS: &str =
    "r.id, r.entitlement_id, r.from_date, r.end_date, r.amount_of_hours, r.created_at";

/// Entitlement summary together with the owner's username, for overviews
/// spanning several users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementRow {
    pub username: String,
    pub summary: EntitlementSummary,
}

/// Leave registration together with its owner and year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRegistrationRow {
    pub username: String,
    pub year: Year,
    pub registration: LeaveRegistration,
}

/// Repository for persisting and querying users, entitlements and leave
/// registrations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run more than once.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::query(MIGRATION_002_LEAVE_REGISTRATIONS)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // User operations
    // ========================

    pub async fn save_user(&self, user: &User) -> Result<()> {
        let permissions_json = Self::permissions_to_json(&user.permissions)?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, first_name, last_name, email, is_active, is_admin, permissions, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.is_active)
        .bind(user.is_admin)
        .bind(&permissions_json)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save user")?;
        Ok(())
    }

    /// Overwrite every mutable field of an existing user.
    pub async fn update_user(&self, user: &User) -> Result<()> {
        let permissions_json = Self::permissions_to_json(&user.permissions)?;

        sqlx::query(
            r#"
            UPDATE users
            SET username = ?, first_name = ?, last_name = ?, email = ?, is_active = ?, is_admin = ?, permissions = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.is_active)
        .bind(user.is_admin)
        .bind(&permissions_json)
        .bind(user.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update user")?;
        Ok(())
    }

    pub async fn get_user_by_name(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by name")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        rows.iter().map(Self::row_to_user).collect()
    }

    pub async fn count_users(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;
        Ok(row.get("count"))
    }

    fn permissions_to_json(permissions: &BTreeSet<Capability>) -> Result<String> {
        serde_json::to_string(permissions).context("Failed to encode permissions")
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
        let id_str: String = row.get("id");
        let permissions_json: String = row.get("permissions");
        let created_at_str: String = row.get("created_at");

        Ok(User {
            id: Uuid::parse_str(&id_str).context("Invalid user ID")?,
            username: row.get("username"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
            is_active: row.get::<i32, _>("is_active") != 0,
            is_admin: row.get::<i32, _>("is_admin") != 0,
            permissions: serde_json::from_str(&permissions_json)
                .context("Invalid permissions list")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Entitlement operations
    // ========================

    pub async fn save_entitlement(&self, entitlement: &Entitlement) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entitlements (id, user_id, year, leave_hours, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(entitlement.id.to_string())
        .bind(entitlement.user_id.to_string())
        .bind(entitlement.year)
        .bind(entitlement.leave_hours)
        .bind(entitlement.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save entitlement")?;
        Ok(())
    }

    pub async fn update_entitlement_hours(&self, id: EntitlementId, leave_hours: Hours) -> Result<()> {
        sqlx::query("UPDATE entitlements SET leave_hours = ? WHERE id = ?")
            .bind(leave_hours)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update entitlement")?;
        Ok(())
    }

    /// Delete an entitlement. Its leave registrations go with it.
    pub async fn delete_entitlement(&self, id: EntitlementId) -> Result<()> {
        sqlx::query("DELETE FROM entitlements WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete entitlement")?;
        Ok(())
    }

    pub async fn get_entitlement(&self, user_id: UserId, year: Year) -> Result<Option<Entitlement>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, year, leave_hours, created_at
            FROM entitlements
            WHERE user_id = ? AND year = ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(year)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch entitlement")?;

        row.as_ref().map(Self::row_to_entitlement).transpose()
    }

    /// List a user's entitlements, oldest year first.
    pub async fn list_entitlements(&self, user_id: UserId) -> Result<Vec<Entitlement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, year, leave_hours, created_at
            FROM entitlements
            WHERE user_id = ?
            ORDER BY year
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list entitlements")?;

        rows.iter().map(Self::row_to_entitlement).collect()
    }

    /// Years for which the user holds an entitlement.
    pub async fn list_entitlement_years(&self, user_id: UserId) -> Result<BTreeSet<Year>> {
        let rows = sqlx::query("SELECT year FROM entitlements WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list entitlement years")?;

        Ok(rows.iter().map(|row| row.get::<Year, _>("year")).collect())
    }

    /// A user's entitlements annotated with used hours, computed in SQL.
    pub async fn list_entitlement_summaries(&self, user_id: UserId) -> Result<Vec<EntitlementSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT e.id, e.user_id, e.year, e.leave_hours, e.created_at,
                   COALESCE(SUM(r.amount_of_hours), 0) as used_hours
            FROM entitlements e
            LEFT JOIN leave_registrations r ON r.entitlement_id = e.id
            WHERE e.user_id = ?
            GROUP BY e.id
            ORDER BY e.year
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list entitlement summaries")?;

        rows.iter().map(Self::row_to_summary).collect()
    }

    pub async fn get_entitlement_summary(
        &self,
        user_id: UserId,
        year: Year,
    ) -> Result<Option<EntitlementSummary>> {
        let row = sqlx::query(
            r#"
            SELECT e.id, e.user_id, e.year, e.leave_hours, e.created_at,
                   COALESCE(SUM(r.amount_of_hours), 0) as used_hours
            FROM entitlements e
            LEFT JOIN leave_registrations r ON r.entitlement_id = e.id
            WHERE e.user_id = ? AND e.year = ?
            GROUP BY e.id
            "#,
        )
        .bind(user_id.to_string())
        .bind(year)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch entitlement summary")?;

        row.as_ref().map(Self::row_to_summary).transpose()
    }

    /// Entitlement summaries across all users, with optional filters.
    pub async fn list_all_entitlement_summaries(
        &self,
        username: Option<&str>,
        year: Option<Year>,
    ) -> Result<Vec<EntitlementRow>> {
        let mut query = String::from(
            r#"
            SELECT u.username, e.id, e.user_id, e.year, e.leave_hours, e.created_at,
                   COALESCE(SUM(r.amount_of_hours), 0) as used_hours
            FROM entitlements e
            JOIN users u ON u.id = e.user_id
            LEFT JOIN leave_registrations r ON r.entitlement_id = e.id
            WHERE 1=1
            "#,
        );

        if username.is_some() {
            query.push_str(" AND u.username = ?");
        }
        if year.is_some() {
            query.push_str(" AND e.year = ?");
        }
        query.push_str(" GROUP BY e.id ORDER BY u.username, e.year");

        let mut sql_query = sqlx::query(&query);
        if let Some(name) = username {
            sql_query = sql_query.bind(name);
        }
        if let Some(y) = year {
            sql_query = sql_query.bind(y);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list entitlement overview")?;

        rows.iter()
            .map(|row| {
                Ok(EntitlementRow {
                    username: row.get("username"),
                    summary: Self::row_to_summary(row)?,
                })
            })
            .collect()
    }

    fn row_to_entitlement(row: &sqlx::sqlite::SqliteRow) -> Result<Entitlement> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");
        let created_at_str: String = row.get("created_at");

        Ok(Entitlement {
            id: Uuid::parse_str(&id_str).context("Invalid entitlement ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            year: row.get("year"),
            leave_hours: row.get("leave_hours"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> Result<EntitlementSummary> {
        let entitlement = Self::row_to_entitlement(row)?;
        let used_hours: Hours = row.get("used_hours");
        Ok(EntitlementSummary::new(entitlement, used_hours))
    }

    // ========================
    // Leave registration operations
    // ========================

    pub async fn save_leave_registration(&self, registration: &LeaveRegistration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO leave_registrations (id, entitlement_id, from_date, end_date, amount_of_hours, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(registration.id.to_string())
        .bind(registration.entitlement_id.to_string())
        .bind(registration.from_date.format(DATE_FORMAT).to_string())
        .bind(registration.end_date.format(DATE_FORMAT).to_string())
        .bind(registration.amount_of_hours)
        .bind(registration.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save leave registration")?;
        Ok(())
    }

    pub async fn update_leave_registration(&self, registration: &LeaveRegistration) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE leave_registrations
            SET entitlement_id = ?, from_date = ?, end_date = ?, amount_of_hours = ?
            WHERE id = ?
            "#,
        )
        .bind(registration.entitlement_id.to_string())
        .bind(registration.from_date.format(DATE_FORMAT).to_string())
        .bind(registration.end_date.format(DATE_FORMAT).to_string())
        .bind(registration.amount_of_hours)
        .bind(registration.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update leave registration")?;
        Ok(())
    }

    pub async fn delete_leave_registration(&self, id: LeaveRegistrationId) -> Result<()> {
        sqlx::query("DELETE FROM leave_registrations WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete leave registration")?;
        Ok(())
    }

    /// Get a leave registration, but only if it belongs to `user_id`.
    pub async fn get_leave_registration_for_user(
        &self,
        id: LeaveRegistrationId,
        user_id: UserId,
    ) -> Result<Option<LeaveRegistration>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {REGISTRATION_COLUMNS}
            FROM leave_registrations r
            JOIN entitlements e ON e.id = r.entitlement_id
            WHERE r.id = ? AND e.user_id = ?
            "#
        ))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch leave registration")?;

        row.as_ref().map(Self::row_to_registration).transpose()
    }

    /// Registrations booked against one entitlement, in date order.
    pub async fn list_leave_registrations(
        &self,
        entitlement_id: EntitlementId,
    ) -> Result<Vec<LeaveRegistration>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {REGISTRATION_COLUMNS}
            FROM leave_registrations r
            WHERE r.entitlement_id = ?
            ORDER BY r.from_date, r.created_at
            "#
        ))
        .bind(entitlement_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list leave registrations")?;

        rows.iter().map(Self::row_to_registration).collect()
    }

    /// Registrations across all users, optionally for one user only.
    pub async fn list_all_leave_registrations(
        &self,
        username: Option<&str>,
    ) -> Result<Vec<LeaveRegistrationRow>> {
        let mut query = format!(
            r#"
            SELECT u.username, e.year, {REGISTRATION_COLUMNS}
            FROM leave_registrations r
            JOIN entitlements e ON e.id = r.entitlement_id
            JOIN users u ON u.id = e.user_id
            WHERE 1=1
            "#
        );
        if username.is_some() {
            query.push_str(" AND u.username = ?");
        }
        query.push_str(" ORDER BY u.username, r.from_date");

        let mut sql_query = sqlx::query(&query);
        if let Some(name) = username {
            sql_query = sql_query.bind(name);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list leave registration overview")?;

        rows.iter()
            .map(|row| {
                Ok(LeaveRegistrationRow {
                    username: row.get("username"),
                    year: row.get("year"),
                    registration: Self::row_to_registration(row)?,
                })
            })
            .collect()
    }

    fn row_to_registration(row: &sqlx::sqlite::SqliteRow) -> Result<LeaveRegistration> {
        let id_str: String = row.get("id");
        let entitlement_id_str: String = row.get("entitlement_id");
        let from_date_str: String = row.get("from_date");
        let end_date_str: String = row.get("end_date");
        let created_at_str: String = row.get("created_at");

        Ok(LeaveRegistration {
            id: Uuid::parse_str(&id_str).context("Invalid leave registration ID")?,
            entitlement_id: Uuid::parse_str(&entitlement_id_str)
                .context("Invalid entitlement ID")?,
            from_date: NaiveDate::parse_from_str(&from_date_str, DATE_FORMAT)
                .context("Invalid from_date")?,
            end_date: NaiveDate::parse_from_str(&end_date_str, DATE_FORMAT)
                .context("Invalid end_date")?,
            amount_of_hours: row.get("amount_of_hours"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}
