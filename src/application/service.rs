use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::domain::{
    Capability, Entitlement, EntitlementSummary, Hours, LeaveRegistration, LeaveRegistrationId,
    LeaveRegistrationInput, User, Year, authorize, default_entitlement, validate_entitlement_year,
    validate_hours, validate_leave_registration,
};
use crate::storage::{EntitlementRow, LeaveRegistrationRow, Repository};

use super::{AppError, RequestContext};

/// Application service providing the leave-tracking operations.
/// This is the primary interface for any client (CLI, API, etc.).
pub struct LeaveService {
    repo: Repository,
}

/// Everything shown on an entitlement's detail page.
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementDetail {
    pub summary: EntitlementSummary,
    pub all_entitlements: Vec<EntitlementSummary>,
    pub leave_registrations: Vec<LeaveRegistration>,
}

/// Filter for the cross-user entitlement overview
#[derive(Debug, Clone, Default)]
pub struct EntitlementFilter {
    pub username: Option<String>,
    pub year: Option<Year>,
}

/// Fields for a new user
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_admin: bool,
    /// Employee defaults when omitted
    pub permissions: Option<BTreeSet<Capability>>,
}

/// Changes to an existing user; `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

impl LeaveService {
    /// Create a new leave service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        info!(database = database_path, "Database initialized");
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        debug!(database = database_path, "Connected to database");
        Ok(Self::new(repo))
    }

    // ========================
    // Identity
    // ========================

    /// Look up the identity an operation is performed as.
    pub async fn resolve_actor(&self, username: &str) -> Result<User, AppError> {
        self.get_user(username).await
    }

    /// Build a request context for `actor`, optionally acting for another user.
    pub async fn context_for(
        &self,
        actor: &str,
        on_behalf_of: Option<&str>,
    ) -> Result<RequestContext, AppError> {
        let actor = self.resolve_actor(actor).await?;
        match on_behalf_of {
            Some(name) if name != actor.username => {
                let subject = self.get_user(name).await?;
                Ok(RequestContext::on_behalf_of(actor, subject)?)
            }
            _ => Ok(RequestContext::new(actor)),
        }
    }

    async fn get_user(&self, username: &str) -> Result<User, AppError> {
        self.repo
            .get_user_by_name(username)
            .await?
            .ok_or_else(|| AppError::UserNotFound(username.to_string()))
    }

    // ========================
    // User operations
    // ========================

    /// Create the first user of a fresh database. The user becomes an admin.
    pub async fn bootstrap_admin(&self, new_user: NewUser) -> Result<User, AppError> {
        if self.repo.count_users().await? > 0 {
            return Err(AppError::AlreadyBootstrapped);
        }
        let user = self
            .insert_user(NewUser {
                is_admin: true,
                ..new_user
            })
            .await?;
        info!(username = %user.username, "Bootstrapped administrator");
        Ok(user)
    }

    pub async fn create_user(
        &self,
        ctx: &RequestContext,
        new_user: NewUser,
    ) -> Result<User, AppError> {
        authorize(ctx.actor(), Capability::ManageUsers)?;
        let user = self.insert_user(new_user).await?;
        info!(actor = %ctx.actor().username, username = %user.username, "Created user");
        Ok(user)
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<User, AppError> {
        if self.repo.get_user_by_name(&new_user.username).await?.is_some() {
            return Err(AppError::UserAlreadyExists(new_user.username));
        }

        let mut user = User::new(new_user.username)
            .with_name(new_user.first_name, new_user.last_name)
            .with_email(new_user.email);
        if let Some(permissions) = new_user.permissions {
            user = user.with_permissions(permissions);
        }
        if new_user.is_admin {
            user = user.as_admin();
        }

        self.repo.save_user(&user).await?;
        Ok(user)
    }

    pub async fn update_user(
        &self,
        ctx: &RequestContext,
        username: &str,
        update: UserUpdate,
    ) -> Result<User, AppError> {
        authorize(ctx.actor(), Capability::ManageUsers)?;
        let mut user = self.get_user(username).await?;

        if let Some(new_name) = update.username {
            if new_name != user.username && self.repo.get_user_by_name(&new_name).await?.is_some() {
                return Err(AppError::UserAlreadyExists(new_name));
            }
            user.username = new_name;
        }
        if let Some(first_name) = update.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            user.last_name = last_name;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(is_active) = update.is_active {
            user.is_active = is_active;
        }

        self.repo.update_user(&user).await?;
        info!(actor = %ctx.actor().username, username = %user.username, "Updated user");
        Ok(user)
    }

    /// Give a user a capability.
    pub async fn grant(
        &self,
        ctx: &RequestContext,
        username: &str,
        capability: Capability,
    ) -> Result<User, AppError> {
        authorize(ctx.actor(), Capability::ManageUsers)?;
        let mut user = self.get_user(username).await?;
        if user.permissions.insert(capability) {
            self.repo.update_user(&user).await?;
            info!(actor = %ctx.actor().username, username, %capability, "Granted capability");
        }
        Ok(user)
    }

    /// Take a capability away from a user.
    pub async fn revoke(
        &self,
        ctx: &RequestContext,
        username: &str,
        capability: Capability,
    ) -> Result<User, AppError> {
        authorize(ctx.actor(), Capability::ManageUsers)?;
        let mut user = self.get_user(username).await?;
        if user.permissions.remove(&capability) {
            self.repo.update_user(&user).await?;
            info!(actor = %ctx.actor().username, username, %capability, "Revoked capability");
            if user.is_admin {
                warn!(username, "Revoked capability from an admin; admins keep every capability");
            }
        }
        Ok(user)
    }

    pub async fn list_users(&self, ctx: &RequestContext) -> Result<Vec<User>, AppError> {
        authorize(ctx.actor(), Capability::ViewUser)?;
        Ok(self.repo.list_users().await?)
    }

    // ========================
    // Entitlement operations
    // ========================

    /// Allot leave hours to a user for a year.
    pub async fn create_entitlement(
        &self,
        ctx: &RequestContext,
        username: &str,
        year: Year,
        leave_hours: Hours,
    ) -> Result<EntitlementSummary, AppError> {
        authorize(ctx.actor(), Capability::AddEntitlement)?;
        let user = self.get_user(username).await?;

        let existing_years = self.repo.list_entitlement_years(user.id).await?;
        let year = validate_entitlement_year(year, &existing_years)?;
        let leave_hours = validate_hours(leave_hours)?;

        let entitlement = Entitlement::new(user.id, year, leave_hours);
        self.repo.save_entitlement(&entitlement).await?;
        info!(
            actor = %ctx.actor().username,
            username,
            year,
            leave_hours,
            "Created entitlement"
        );

        Ok(EntitlementSummary::new(entitlement, 0))
    }

    /// Change the hours allotted for an existing (user, year).
    pub async fn update_entitlement(
        &self,
        ctx: &RequestContext,
        username: &str,
        year: Year,
        leave_hours: Hours,
    ) -> Result<EntitlementSummary, AppError> {
        authorize(ctx.actor(), Capability::ChangeEntitlement)?;
        let leave_hours = validate_hours(leave_hours)?;
        let user = self.get_user(username).await?;
        let entitlement = self
            .repo
            .get_entitlement(user.id, year)
            .await?
            .ok_or_else(|| AppError::EntitlementNotFound {
                username: username.to_string(),
                year,
            })?;

        self.repo
            .update_entitlement_hours(entitlement.id, leave_hours)
            .await?;
        info!(actor = %ctx.actor().username, username, year, leave_hours, "Updated entitlement");

        self.summary_for(&user, year).await
    }

    /// Remove an entitlement together with its leave registrations.
    pub async fn delete_entitlement(
        &self,
        ctx: &RequestContext,
        username: &str,
        year: Year,
    ) -> Result<(), AppError> {
        authorize(ctx.actor(), Capability::DeleteEntitlement)?;
        let user = self.get_user(username).await?;
        let entitlement = self
            .repo
            .get_entitlement(user.id, year)
            .await?
            .ok_or_else(|| AppError::EntitlementNotFound {
                username: username.to_string(),
                year,
            })?;

        self.repo.delete_entitlement(entitlement.id).await?;
        info!(actor = %ctx.actor().username, username, year, "Deleted entitlement");
        Ok(())
    }

    /// The subject's entitlements with used and remaining hours.
    pub async fn list_entitlements(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<EntitlementSummary>, AppError> {
        authorize(ctx.actor(), Capability::ViewEntitlement)?;
        Ok(self.repo.list_entitlement_summaries(ctx.subject().id).await?)
    }

    /// One year in detail: the annotated entitlement, the subject's other
    /// entitlements and the registrations booked against it.
    pub async fn entitlement_detail(
        &self,
        ctx: &RequestContext,
        year: Year,
    ) -> Result<EntitlementDetail, AppError> {
        authorize(ctx.actor(), Capability::ViewEntitlement)?;
        let subject = ctx.subject();

        let summary = self.summary_for(subject, year).await?;
        let all_entitlements = self.repo.list_entitlement_summaries(subject.id).await?;
        let leave_registrations = self
            .repo
            .list_leave_registrations(summary.entitlement.id)
            .await?;

        Ok(EntitlementDetail {
            summary,
            all_entitlements,
            leave_registrations,
        })
    }

    /// The entitlement to open with: this year's, else the latest one.
    pub async fn default_entitlement(
        &self,
        ctx: &RequestContext,
        today: NaiveDate,
    ) -> Result<Option<EntitlementSummary>, AppError> {
        authorize(ctx.actor(), Capability::ViewEntitlement)?;
        let subject = ctx.subject();

        let entitlements = self.repo.list_entitlements(subject.id).await?;
        match default_entitlement(&entitlements, today.year()) {
            Some(entitlement) => Ok(Some(self.summary_for(subject, entitlement.year).await?)),
            None => Ok(None),
        }
    }

    /// Entitlements across every user, for administrators.
    pub async fn list_all_entitlements(
        &self,
        ctx: &RequestContext,
        filter: EntitlementFilter,
    ) -> Result<Vec<EntitlementRow>, AppError> {
        authorize(ctx.actor(), Capability::ViewUser)?;
        authorize(ctx.actor(), Capability::ViewEntitlement)?;
        Ok(self
            .repo
            .list_all_entitlement_summaries(filter.username.as_deref(), filter.year)
            .await?)
    }

    async fn summary_for(&self, user: &User, year: Year) -> Result<EntitlementSummary, AppError> {
        self.repo
            .get_entitlement_summary(user.id, year)
            .await?
            .ok_or_else(|| AppError::EntitlementNotFound {
                username: user.username.clone(),
                year,
            })
    }

    // ========================
    // Leave registration operations
    // ========================

    /// Book a leave period against the subject's entitlement for its year.
    pub async fn create_leave_registration(
        &self,
        ctx: &RequestContext,
        input: LeaveRegistrationInput,
    ) -> Result<LeaveRegistration, AppError> {
        authorize(ctx.actor(), Capability::AddLeaveRegistration)?;
        let subject = ctx.subject();

        let years = self.repo.list_entitlement_years(subject.id).await?;
        let fields = validate_leave_registration(&input, &years)?;
        let entitlement = self
            .repo
            .get_entitlement(subject.id, fields.year())
            .await?
            .ok_or_else(|| AppError::EntitlementNotFound {
                username: subject.username.clone(),
                year: fields.year(),
            })?;

        let registration = LeaveRegistration::new(entitlement.id, fields);
        self.repo.save_leave_registration(&registration).await?;
        info!(
            actor = %ctx.actor().username,
            username = %subject.username,
            id = %registration.id,
            hours = registration.amount_of_hours,
            "Created leave registration"
        );

        Ok(registration)
    }

    /// Change a registration's period or hours. It moves to the entitlement
    /// of the new year when the year changes.
    pub async fn update_leave_registration(
        &self,
        ctx: &RequestContext,
        id: LeaveRegistrationId,
        input: LeaveRegistrationInput,
    ) -> Result<LeaveRegistration, AppError> {
        authorize(ctx.actor(), Capability::ChangeLeaveRegistration)?;
        let subject = ctx.subject();
        let mut registration = self.owned_registration(subject, id).await?;

        let years = self.repo.list_entitlement_years(subject.id).await?;
        let fields = validate_leave_registration(&input, &years)?;
        let entitlement = self
            .repo
            .get_entitlement(subject.id, fields.year())
            .await?
            .ok_or_else(|| AppError::EntitlementNotFound {
                username: subject.username.clone(),
                year: fields.year(),
            })?;

        if entitlement.id != registration.entitlement_id {
            debug!(%id, year = fields.year(), "Moving leave registration to another year");
        }
        registration.apply(entitlement.id, fields);
        self.repo.update_leave_registration(&registration).await?;
        info!(actor = %ctx.actor().username, username = %subject.username, %id, "Updated leave registration");

        Ok(registration)
    }

    pub async fn delete_leave_registration(
        &self,
        ctx: &RequestContext,
        id: LeaveRegistrationId,
    ) -> Result<LeaveRegistration, AppError> {
        authorize(ctx.actor(), Capability::DeleteLeaveRegistration)?;
        let registration = self.owned_registration(ctx.subject(), id).await?;

        self.repo.delete_leave_registration(id).await?;
        info!(actor = %ctx.actor().username, username = %ctx.subject().username, %id, "Deleted leave registration");
        Ok(registration)
    }

    pub async fn get_leave_registration(
        &self,
        ctx: &RequestContext,
        id: LeaveRegistrationId,
    ) -> Result<LeaveRegistration, AppError> {
        authorize(ctx.actor(), Capability::ViewEntitlement)?;
        self.owned_registration(ctx.subject(), id).await
    }

    /// Leave registrations across every user, for administrators.
    pub async fn list_all_leave_registrations(
        &self,
        ctx: &RequestContext,
        username: Option<&str>,
    ) -> Result<Vec<LeaveRegistrationRow>, AppError> {
        authorize(ctx.actor(), Capability::ViewUser)?;
        Ok(self.repo.list_all_leave_registrations(username).await?)
    }

    /// Registrations of other users are reported as missing, not forbidden.
    async fn owned_registration(
        &self,
        subject: &User,
        id: LeaveRegistrationId,
    ) -> Result<LeaveRegistration, AppError> {
        self.repo
            .get_leave_registration_for_user(id, subject.id)
            .await?
            .ok_or_else(|| AppError::LeaveRegistrationNotFound(id.to_string()))
    }
}
