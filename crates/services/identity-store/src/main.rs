//! Identity Admin - maintenance CLI for the identity store.

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use common::OperationContext;
use domain::{Role, User};
use identity_store::config::IdentityStoreConfig;
use identity_store::store::{QueryableRoles, QueryableUsers};
use identity_store::{IdentityStores, MigrateAction};

#[derive(Parser)]
#[command(name = "identity-admin")]
#[command(about = "Identity store administration")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, global = true, env = "IDENTITY_DATABASE_URL")]
    database_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database migration commands
    Migrate {
        #[command(subcommand)]
        action: MigrateCommands,
    },
    /// Check database connectivity
    Ping,
    /// User commands
    Users {
        #[command(subcommand)]
        action: RecordCommands,
    },
    /// Role commands
    Roles {
        #[command(subcommand)]
        action: RecordCommands,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset database and run all migrations
    Fresh,
}

#[derive(Subcommand)]
enum RecordCommands {
    /// List all records
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one record by id or name
    Get {
        /// Record id or name
        key: String,
    },
}

#[derive(Serialize)]
struct UserSummary {
    id: String,
    user_name: Option<String>,
    email: Option<String>,
    email_confirmed: bool,
    lockout_enabled: bool,
    access_failed_count: i32,
}

impl From<User> for UserSummary {
    fn from(u: User) -> Self {
        Self {
            id: u.id.to_string(),
            user_name: u.user_name,
            email: u.email,
            email_confirmed: u.email_confirmed,
            lockout_enabled: u.lockout_enabled,
            access_failed_count: u.access_failed_count,
        }
    }
}

#[derive(Serialize)]
struct RoleSummary {
    id: String,
    name: Option<String>,
    normalized_name: Option<String>,
}

impl From<Role> for RoleSummary {
    fn from(r: Role) -> Self {
        Self {
            id: r.id.to_string(),
            name: r.name,
            normalized_name: r.normalized_name,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = IdentityStoreConfig::from_env().with_database_url(cli.database_url);
    let ctx = OperationContext::background();

    match cli.command {
        Commands::Migrate { action } => {
            let migrate_action = match action {
                MigrateCommands::Up => MigrateAction::Up,
                MigrateCommands::Down => MigrateAction::Down,
                MigrateCommands::Status => MigrateAction::Status,
                MigrateCommands::Fresh => MigrateAction::Fresh,
            };
            let status = identity_store::run_migrations(&config, migrate_action).await?;
            for (name, applied) in status {
                let marker = if applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, name);
            }
        }
        Commands::Ping => {
            identity_store::ping(&config, &ctx).await?;
            println!("ok");
        }
        Commands::Users {
            action: RecordCommands::List { json },
        } => {
            let stores = IdentityStores::from_config(&config)?;
            let users: Vec<UserSummary> = stores
                .users
                .users(&ctx)
                .await?
                .into_iter()
                .map(UserSummary::from)
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
            } else {
                for user in &users {
                    println!(
                        "{}  {:<24} {}",
                        user.id,
                        user.user_name.as_deref().unwrap_or("-"),
                        user.email.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::Roles {
            action: RecordCommands::List { json },
        } => {
            let stores = IdentityStores::from_config(&config)?;
            let roles: Vec<RoleSummary> = stores
                .roles
                .roles(&ctx)
                .await?
                .into_iter()
                .map(RoleSummary::from)
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&roles)?);
            } else {
                for role in &roles {
                    println!("{}  {}", role.id, role.name.as_deref().unwrap_or("-"));
                }
            }
        }
        Commands::Users {
            action: RecordCommands::Get { key },
        } => {
            let stores = IdentityStores::from_config(&config)?;
            let user = UserSummary::from(stores.require_user(&ctx, &key).await?);
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Commands::Roles {
            action: RecordCommands::Get { key },
        } => {
            let stores = IdentityStores::from_config(&config)?;
            let role = RoleSummary::from(stores.require_role(&ctx, &key).await?);
            println!("{}", serde_json::to_string_pretty(&role)?);
        }
    }

    Ok(())
}
