//! Fydo CLI - Database migrations, seeding and batch jobs.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! fydo-cli migrate
//!
//! # Insert default criteria and categories
//! fydo-cli seed
//!
//! # Generate AI reviews for up to 50 products that lack one
//! fydo-cli ai-reviews --limit 50
//!
//! # Grant moderation rights
//! fydo-cli admin grant auth0|abc123
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Seed default review criteria and categories
//! - `ai-reviews` - Batch AI review generation
//! - `admin` - Grant or revoke admin rights

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "fydo-cli")]
#[command(author, version, about = "Fydo CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Insert default review criteria and categories (idempotent)
    Seed,
    /// Generate AI reviews for products that don't have one
    AiReviews {
        /// Maximum number of products to process
        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },
    /// Manage admin rights
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Grant admin rights to a user
    Grant {
        /// External id issued by the authentication provider
        external_id: String,
    },
    /// Revoke admin rights from a user
    Revoke {
        /// External id issued by the authentication provider
        external_id: String,
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
        Commands::Seed => commands::seed::run().await?,
        Commands::AiReviews { limit } => commands::ai_reviews::run(limit).await?,
        Commands::Admin { action } => match action {
            AdminAction::Grant { external_id } => {
                commands::admin::set_admin(&external_id, true).await?;
            }
            AdminAction::Revoke { external_id } => {
                commands::admin::set_admin(&external_id, false).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_ai_reviews_limit() {
        let cli = Cli::try_parse_from(["fydo-cli", "ai-reviews", "--limit", "5"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::AiReviews { limit: 5 })
        ));
    }

    #[test]
    fn test_parses_admin_grant() {
        let cli = Cli::try_parse_from(["fydo-cli", "admin", "grant", "auth0|42"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Admin {
                action: AdminAction::Grant { external_id }
            }) if external_id == "auth0|42"
        ));
    }
}
