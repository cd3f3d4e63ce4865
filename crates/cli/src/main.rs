//! Sugbo Trails CLI - local data maintenance and engine health tools.
//!
//! # Usage
//!
//! ```bash
//! # Move legacy unscoped keys under an identity scope
//! sugbo-cli migrate --scope guest
//!
//! # Apply a category reset
//! sugbo-cli reset user-data
//!
//! # Initialize the engine and print a health report
//! sugbo-cli status
//! ```
//!
//! # Commands
//!
//! - `migrate` - Retire the legacy unscoped key scheme
//! - `reset` - Apply a category reset to local data
//! - `status` - Initialize and report component health

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand, ValueEnum};
use sugbo_sync::ResetCategory;

mod commands;

#[derive(Parser)]
#[command(name = "sugbo-cli")]
#[command(author, version, about = "Sugbo Trails sync core tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move legacy unscoped keys under an identity scope
    Migrate {
        /// Identity scope to migrate into (opaque user id, or `guest`)
        #[arg(short, long, default_value = "guest")]
        scope: String,
    },
    /// Apply a category reset to local data
    Reset {
        /// What to clear
        #[arg(value_enum)]
        category: ResetArg,
    },
    /// Initialize the engine and print component health
    Status,
}

/// Reset categories as CLI values.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ResetArg {
    All,
    Settings,
    Language,
    Cache,
    Preferences,
    UserData,
    Privacy,
}

impl From<ResetArg> for ResetCategory {
    fn from(arg: ResetArg) -> Self {
        match arg {
            ResetArg::All => Self::All,
            ResetArg::Settings => Self::SettingsOnly,
            ResetArg::Language => Self::LanguageOnly,
            ResetArg::Cache => Self::CacheOnly,
            ResetArg::Preferences => Self::Preferences,
            ResetArg::UserData => Self::UserData,
            ResetArg::Privacy => Self::Privacy,
        }
    }
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
        Commands::Migrate { scope } => commands::migrate::run(&scope).await?,
        Commands::Reset { category } => commands::reset::run(category.into()).await?,
        Commands::Status => commands::status::run().await?,
    }
    Ok(())
}
