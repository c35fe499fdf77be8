//! pitchhub CLI - run and administer the pitchhub API server
//!
//! Subcommands:
//! - `serve`: run the HTTP API (migrations and sweeps included)
//! - `migrate`: apply the database schema
//! - `init-storage`: create the upload directory layout
//! - `sweep`: purge expired entries from the token blacklist once
//! - `promote`: change a user's role, e.g. grant admin
//!
//! Settings are read from the environment; a `.env` file in the working
//! directory is loaded first when present.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "pitchhub",
    author,
    version,
    about = "API server and admin tooling for the pitchhub investment network"
)]
struct Cli {
    /// Enable debug logging (unless RUST_LOG is set)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Apply the database schema (idempotent)
    Migrate(commands::migrate::MigrateArgs),
    /// Create the upload directory layout (idempotent)
    InitStorage(commands::storage::InitStorageArgs),
    /// Remove expired tokens from the blacklist once
    Sweep(commands::sweep::SweepArgs),
    /// Change a user's role
    Promote(commands::promote::PromoteArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_setup::init_tracing(&TracingConfig { debug: cli.debug }).ok();

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await?,
        Commands::Migrate(args) => commands::run_migrate(args).await?,
        Commands::InitStorage(args) => commands::run_init_storage(args).await?,
        Commands::Sweep(args) => commands::run_sweep(args).await?,
        Commands::Promote(args) => commands::run_promote(args).await?,
    }
    Ok(())
}
