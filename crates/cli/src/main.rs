//! Listkeeper CLI - Database migrations and list management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! listkeeper-cli migrate
//!
//! # Create a mailing list
//! listkeeper-cli lists create -s newsletter -n "Newsletter" --default
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `lists create` - Create mailing lists administratively
//!
//! # Environment Variables
//!
//! - `LISTKEEPER_DATABASE_URL` - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "listkeeper-cli")]
#[command(author, version, about = "Listkeeper CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage mailing lists
    Lists {
        #[command(subcommand)]
        action: ListsAction,
    },
}

#[derive(Subcommand)]
enum ListsAction {
    /// Create a new mailing list
    Create {
        /// URL-safe unique slug
        #[arg(short, long)]
        slug: String,

        /// Human-readable name
        #[arg(short, long)]
        name: String,

        /// Optional description
        #[arg(short = 'd', long)]
        description: Option<String>,

        /// Auto-subscribe every new account to this list
        #[arg(long = "default")]
        is_default: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
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
        Commands::Lists { action } => match action {
            ListsAction::Create {
                slug,
                name,
                description,
                is_default,
            } => {
                commands::lists::create(&slug, &name, description.as_deref(), is_default).await?;
            }
        },
    }
    Ok(())
}
