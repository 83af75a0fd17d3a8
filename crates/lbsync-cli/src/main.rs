//! lbsync CLI
//!
//! Command-line interface for the lbsync admin API.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// lbsync - load balancer routing reconciler
#[derive(Parser, Debug)]
#[command(name = "lbsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Admin API address
    #[arg(long, default_value = "http://localhost:3000", global = true)]
    api: String,

    /// Admin user
    #[arg(long, default_value = "admin", global = true)]
    user: String,

    /// Admin password
    #[arg(long, env = "LBSYNC_ADMIN_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replace the frontend declarations with the contents of a JSON file
    Push {
        /// File holding a JSON array of declarations
        file: PathBuf,
    },

    /// Show the committed frontends
    Frontends,

    /// Show the stored declarations
    Declarations,

    /// Show reconciler status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let client = commands::ApiClient::new(&cli.api, &cli.user, cli.password);

    match cli.command {
        Commands::Push { file } => {
            commands::push(&client, &file).await?;
        }
        Commands::Frontends => {
            commands::frontends(&client).await?;
        }
        Commands::Declarations => {
            commands::declarations(&client).await?;
        }
        Commands::Status => {
            commands::status(&client).await?;
        }
    }

    Ok(())
}
