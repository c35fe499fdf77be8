//! HTTP server command
//!
//! Runs the pitchhub API with migrations, upload layout and blacklist sweeps.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use pitchhub_server::http::{run_server, ServerConfig};
use pitchhub_server::AppConfig;

use super::DatabaseArgs;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, short = 'b', env = "PITCHHUB_BIND", default_value = "127.0.0.1:3030")]
    pub bind: SocketAddr,

    /// Uploads root directory (overrides UPLOADS_ROOT)
    #[arg(long, value_name = "DIR")]
    pub uploads: Option<PathBuf>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    #[command(flatten)]
    pub database: DatabaseArgs,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut app_config = AppConfig::from_env().context("Invalid server configuration")?;
    if let Some(root) = args.uploads {
        app_config.uploads_root = root;
    }

    tracing::info!("Starting pitchhub server on {}", args.bind);

    let pool = args.database.connect().await?;

    let config = ServerConfig {
        bind_addr: args.bind,
        cors_permissive: args.cors_permissive,
    };

    // Blocks until shutdown
    run_server(pool, app_config, config)
        .await
        .context("Server error")?;

    Ok(())
}
