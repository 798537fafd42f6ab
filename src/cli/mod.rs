use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::application::{
    AppError, EntitlementFilter, LeaveService, NewUser, RequestContext, UserUpdate,
};
use crate::domain::{
    Capability, EntitlementSummary, Hours, LeaveRegistration, LeaveRegistrationInput, User, Year,
};

/// Verlof - annual leave tracker
#[derive(Parser)]
#[command(name = "verlof")]
#[command(about = "Track annual leave entitlements and the leave booked against them")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "VERLOF_DATABASE", default_value = "verlof.db")]
    pub database: String,

    /// Username to act as
    #[arg(short, long, env = "VERLOF_USER", global = true)]
    pub user: Option<String>,

    /// Work on another user's data (administrators only)
    #[arg(long, global = true)]
    pub on_behalf_of: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database, optionally creating the first administrator
    Init {
        /// Username of the first administrator
        #[arg(long)]
        admin: Option<String>,

        #[arg(long, default_value = "")]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,

        #[arg(long, default_value = "")]
        email: String,
    },

    /// Show the entitlement to start from (this year's, else the latest)
    Home,

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Entitlement commands
    #[command(subcommand)]
    Entitlement(EntitlementCommands),

    /// Leave registration commands
    #[command(subcommand)]
    Leave(LeaveCommands),
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a new user
    Create {
        /// Username (must be unique)
        username: String,

        #[arg(long, default_value = "")]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,

        #[arg(long, default_value = "")]
        email: String,

        /// Make the user an administrator
        #[arg(long)]
        admin: bool,

        /// Capability to grant instead of the employee defaults (repeatable)
        #[arg(short, long = "permission")]
        permissions: Vec<String>,
    },

    /// List all users
    List,

    /// Change a user's details
    Update {
        /// Current username
        username: String,

        /// New username
        #[arg(long = "rename")]
        new_username: Option<String>,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        /// Activate or deactivate the account
        #[arg(long, action = ArgAction::Set)]
        active: Option<bool>,
    },

    /// Grant a capability
    Grant { username: String, capability: String },

    /// Revoke a capability
    Revoke { username: String, capability: String },
}

#[derive(Subcommand)]
pub enum EntitlementCommands {
    /// Allot leave hours to a user for a year
    Create {
        username: String,
        year: Year,

        /// Leave hours for the year
        #[arg(long, allow_negative_numbers = true)]
        hours: Hours,
    },

    /// Change the hours allotted for a year
    Update {
        username: String,
        year: Year,

        #[arg(long, allow_negative_numbers = true)]
        hours: Hours,
    },

    /// Delete an entitlement and all leave booked against it
    Delete { username: String, year: Year },

    /// List entitlements with used and remaining hours
    List,

    /// Show one year with its leave registrations
    Show { year: Year },

    /// Overview across all users (administrators)
    All {
        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        year: Option<Year>,
    },
}

#[derive(Subcommand)]
pub enum LeaveCommands {
    /// Register a leave period
    Add {
        /// First day of leave (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Last day of leave (YYYY-MM-DD)
        #[arg(long)]
        to: String,

        /// Hours of leave taken
        #[arg(long, allow_negative_numbers = true)]
        hours: Hours,
    },

    /// Change a leave registration
    Update {
        id: String,

        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        #[arg(long, allow_negative_numbers = true)]
        hours: Hours,
    },

    /// Delete a leave registration
    Delete { id: String },

    /// Show a leave registration
    Show { id: String },

    /// Overview across all users (administrators)
    All {
        #[arg(long)]
        username: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init {
                ref admin,
                ref first_name,
                ref last_name,
                ref email,
            } => {
                let service = LeaveService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);

                if let Some(username) = admin {
                    let user = service
                        .bootstrap_admin(NewUser {
                            username: username.clone(),
                            first_name: first_name.clone(),
                            last_name: last_name.clone(),
                            email: email.clone(),
                            ..Default::default()
                        })
                        .await?;
                    println!("Created administrator: {}", user.username);
                }
            }

            Commands::Home => {
                let service = LeaveService::connect(&self.database).await?;
                let ctx = self.context(&service).await?;
                let today = Local::now().date_naive();
                let summary = service.default_entitlement(&ctx, today).await?;

                match (self.format, summary) {
                    (OutputFormat::Json, summary) => print_json(&summary)?,
                    (OutputFormat::Table, None) => println!("No data available yet."),
                    (OutputFormat::Table, Some(summary)) => print_summaries(&[summary]),
                }
            }

            Commands::User(ref cmd) => {
                let service = LeaveService::connect(&self.database).await?;
                let ctx = self.context(&service).await?;
                run_user_command(&service, &ctx, cmd, self.format).await?;
            }

            Commands::Entitlement(ref cmd) => {
                let service = LeaveService::connect(&self.database).await?;
                let ctx = self.context(&service).await?;
                run_entitlement_command(&service, &ctx, cmd, self.format).await?;
            }

            Commands::Leave(ref cmd) => {
                let service = LeaveService::connect(&self.database).await?;
                let ctx = self.context(&service).await?;
                run_leave_command(&service, &ctx, cmd, self.format).await?;
            }
        }

        Ok(())
    }

    async fn context(&self, service: &LeaveService) -> Result<RequestContext> {
        let Some(actor) = self.user.as_deref() else {
            bail!("No acting user: pass --user or set VERLOF_USER");
        };
        Ok(service
            .context_for(actor, self.on_behalf_of.as_deref())
            .await?)
    }
}

async fn run_user_command(
    service: &LeaveService,
    ctx: &RequestContext,
    cmd: &UserCommands,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        UserCommands::Create {
            username,
            first_name,
            last_name,
            email,
            admin,
            permissions,
        } => {
            let permissions = if permissions.is_empty() {
                None
            } else {
                Some(parse_capabilities(permissions)?)
            };
            let user = service
                .create_user(
                    ctx,
                    NewUser {
                        username: username.clone(),
                        first_name: first_name.clone(),
                        last_name: last_name.clone(),
                        email: email.clone(),
                        is_admin: *admin,
                        permissions,
                    },
                )
                .await?;
            println!("Created user: {}", user.username);
        }

        UserCommands::List => {
            let users = service.list_users(ctx).await?;
            match format {
                OutputFormat::Json => print_json(&users)?,
                OutputFormat::Table => print_users(&users),
            }
        }

        UserCommands::Update {
            username,
            new_username,
            first_name,
            last_name,
            email,
            active,
        } => {
            let user = service
                .update_user(
                    ctx,
                    username,
                    UserUpdate {
                        username: new_username.clone(),
                        first_name: first_name.clone(),
                        last_name: last_name.clone(),
                        email: email.clone(),
                        is_active: *active,
                    },
                )
                .await?;
            println!("Updated user: {}", user.username);
        }

        UserCommands::Grant {
            username,
            capability,
        } => {
            let capability = parse_capability(capability)?;
            service.grant(ctx, username, capability).await?;
            println!("Granted {} to {}", capability, username);
        }

        UserCommands::Revoke {
            username,
            capability,
        } => {
            let capability = parse_capability(capability)?;
            service.revoke(ctx, username, capability).await?;
            println!("Revoked {} from {}", capability, username);
        }
    }

    Ok(())
}

async fn run_entitlement_command(
    service: &LeaveService,
    ctx: &RequestContext,
    cmd: &EntitlementCommands,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        EntitlementCommands::Create {
            username,
            year,
            hours,
        } => {
            let summary = service
                .create_entitlement(ctx, username, *year, *hours)
                .await?;
            println!(
                "Created {}: {} hours",
                summary.entitlement.label(username),
                summary.entitlement.leave_hours
            );
        }

        EntitlementCommands::Update {
            username,
            year,
            hours,
        } => {
            let summary = service
                .update_entitlement(ctx, username, *year, *hours)
                .await?;
            println!(
                "Updated entitlement: {} hours for {} in {} ({} remaining)",
                summary.entitlement.leave_hours,
                username,
                summary.entitlement.year,
                summary.remainder_hours
            );
        }

        EntitlementCommands::Delete { username, year } => {
            service.delete_entitlement(ctx, username, *year).await?;
            println!("Deleted entitlement for {} in {}", username, year);
        }

        EntitlementCommands::List => {
            let summaries = service.list_entitlements(ctx).await?;
            match format {
                OutputFormat::Json => print_json(&summaries)?,
                OutputFormat::Table if summaries.is_empty() => {
                    println!("No entitlements found.")
                }
                OutputFormat::Table => print_summaries(&summaries),
            }
        }

        EntitlementCommands::Show { year } => {
            let detail = service.entitlement_detail(ctx, *year).await?;
            match format {
                OutputFormat::Json => print_json(&detail)?,
                OutputFormat::Table => {
                    let summary = &detail.summary;
                    println!("{}", summary.entitlement.label(&ctx.subject().username));
                    println!("  Leave hours:    {}", summary.entitlement.leave_hours);
                    println!("  Used hours:     {}", summary.used_hours);
                    println!(
                        "  Remaining:      {} ({})",
                        summary.remainder_hours, summary.status
                    );
                    println!();
                    if detail.leave_registrations.is_empty() {
                        println!("No leave registered.");
                    } else {
                        print_registrations(&detail.leave_registrations);
                    }
                    let other_years: Vec<String> = detail
                        .all_entitlements
                        .iter()
                        .map(|s| s.entitlement.year.to_string())
                        .collect();
                    println!();
                    println!("Years: {}", other_years.join(", "));
                }
            }
        }

        EntitlementCommands::All { username, year } => {
            let rows = service
                .list_all_entitlements(
                    ctx,
                    EntitlementFilter {
                        username: username.clone(),
                        year: *year,
                    },
                )
                .await?;
            match format {
                OutputFormat::Json => print_json(&rows)?,
                OutputFormat::Table => {
                    println!(
                        "{:<16} {:<6} {:>8} {:>8} {:>10} {:<8}",
                        "USER", "YEAR", "HOURS", "USED", "REMAINING", "STATUS"
                    );
                    println!("{}", "-".repeat(61));
                    for row in &rows {
                        let s = &row.summary;
                        println!(
                            "{:<16} {:<6} {:>8} {:>8} {:>10} {:<8}",
                            row.username,
                            s.entitlement.year,
                            s.entitlement.leave_hours,
                            s.used_hours,
                            s.remainder_hours,
                            s.status
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

async fn run_leave_command(
    service: &LeaveService,
    ctx: &RequestContext,
    cmd: &LeaveCommands,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        LeaveCommands::Add { from, to, hours } => {
            let registration = service
                .create_leave_registration(ctx, LeaveRegistrationInput::new(from, to, *hours))
                .await?;
            println!(
                "Registered leave: {} to {}, {} hours ({})",
                registration.from_date,
                registration.end_date,
                registration.amount_of_hours,
                registration.id
            );
        }

        LeaveCommands::Update {
            id,
            from,
            to,
            hours,
        } => {
            let id = parse_id(id)?;
            let registration = service
                .update_leave_registration(ctx, id, LeaveRegistrationInput::new(from, to, *hours))
                .await?;
            println!(
                "Updated leave: {} to {}, {} hours ({})",
                registration.from_date,
                registration.end_date,
                registration.amount_of_hours,
                registration.id
            );
        }

        LeaveCommands::Delete { id } => {
            let registration = service.delete_leave_registration(ctx, parse_id(id)?).await?;
            println!(
                "Deleted leave: {} to {} ({})",
                registration.from_date, registration.end_date, registration.id
            );
        }

        LeaveCommands::Show { id } => {
            let registration = service.get_leave_registration(ctx, parse_id(id)?).await?;
            match format {
                OutputFormat::Json => print_json(&registration)?,
                OutputFormat::Table => {
                    println!("Leave registration: {}", registration);
                    println!("  Year:     {}", registration.year());
                    println!("  From:     {}", registration.from_date);
                    println!("  To:       {}", registration.end_date);
                    println!("  Days:     {}", registration.days());
                    println!("  Hours:    {}", registration.amount_of_hours);
                    println!(
                        "  Recorded: {}",
                        registration.created_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }

        LeaveCommands::All { username } => {
            let rows = service
                .list_all_leave_registrations(ctx, username.as_deref())
                .await?;
            match format {
                OutputFormat::Json => print_json(&rows)?,
                OutputFormat::Table => {
                    println!(
                        "{:<16} {:<12} {:<12} {:>6}",
                        "USER", "FROM", "TO", "HOURS"
                    );
                    println!("{}", "-".repeat(49));
                    for row in &rows {
                        println!(
                            "{:<16} {:<12} {:<12} {:>6}",
                            row.username,
                            row.registration.from_date,
                            row.registration.end_date,
                            row.registration.amount_of_hours
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

/// A follow-up line for errors where the named user, year or id does not exist.
pub fn not_found_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<AppError>())
        .filter(|app_err| app_err.is_not_found())
        .map(|_| "Nothing matched. Check the username, year or id; `verlof entitlement list` and `verlof leave all` show what exists.")
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).context("Invalid leave registration ID format (expected UUID)")
}

fn parse_capability(name: &str) -> Result<Capability> {
    Capability::from_str(name).with_context(|| {
        let known: Vec<&str> = Capability::ALL.iter().map(|c| c.as_str()).collect();
        format!("Unknown capability '{}'. Known: {}", name, known.join(", "))
    })
}

fn parse_capabilities(names: &[String]) -> Result<BTreeSet<Capability>> {
    names.iter().map(|n| parse_capability(n)).collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_summaries(summaries: &[EntitlementSummary]) {
    println!(
        "{:<6} {:>8} {:>8} {:>10} {:<8}",
        "YEAR", "HOURS", "USED", "REMAINING", "STATUS"
    );
    println!("{}", "-".repeat(44));
    for s in summaries {
        println!(
            "{:<6} {:>8} {:>8} {:>10} {:<8}",
            s.entitlement.year, s.entitlement.leave_hours, s.used_hours, s.remainder_hours, s.status
        );
    }
}

fn print_registrations(registrations: &[LeaveRegistration]) {
    println!("{:<36} {:<12} {:<12} {:>6}", "ID", "FROM", "TO", "HOURS");
    println!("{}", "-".repeat(69));
    for r in registrations {
        println!(
            "{:<36} {:<12} {:<12} {:>6}",
            r.id.to_string(),
            r.from_date.to_string(),
            r.end_date.to_string(),
            r.amount_of_hours
        );
    }
}

fn print_users(users: &[User]) {
    if users.is_empty() {
        println!("No users found.");
        return;
    }
    println!(
        "{:<16} {:<24} {:<28} {:<7} {:<6}",
        "USERNAME", "NAME", "EMAIL", "ACTIVE", "ADMIN"
    );
    println!("{}", "-".repeat(85));
    for user in users {
        println!(
            "{:<16} {:<24} {:<28} {:<7} {:<6}",
            user.username,
            user.full_name(),
            user.email,
            if user.is_active { "yes" } else { "no" },
            if user.is_admin { "yes" } else { "no" }
        );
    }
}
