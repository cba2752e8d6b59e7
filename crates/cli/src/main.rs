//! Novare CLI - database migrations, catalog seeding and admin accounts.
//!
//! # Usage
//!
//! ```bash
//! # Apply the store schema
//! novare migrate
//!
//! # Load the demo catalog, replacing what is there
//! novare seed seed/catalog.yaml --clear
//!
//! # Create an admin account
//! novare admin create -u ops -e ops@novare.store -p "+233200000000" --password '...'
//!
//! # Promote an existing shopper
//! novare admin promote someone@example.com
//! ```
//!
//! All commands read `NOVARE_DATABASE_URL` (or `DATABASE_URL`), loading a
//! `.env` file first when one exists.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "novare")]
#[command(author, version, about = "Novare store CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Load products and lookbooks from a YAML catalog
    Seed {
        /// Path to the catalog file
        file: String,

        /// Delete the existing catalog first
        #[arg(long)]
        clear: bool,
    },
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin account
    Create {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        phone: String,

        /// Initial password; the admin should change it after first login
        #[arg(long, env = "NOVARE_ADMIN_PASSWORD")]
        password: String,
    },
    /// Grant the admin role to an existing account
    Promote {
        /// Email of the account to promote
        email: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file, clear } => commands::seed::catalog(&file, clear).await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                username,
                email,
                phone,
                password,
            } => {
                commands::admin::create_user(&username, &email, &phone, &password).await?;
            }
            AdminAction::Promote { email } => commands::admin::promote(&email).await?,
        },
    }
    Ok(())
}
