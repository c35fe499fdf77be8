//! Command implementations for the pitchhub CLI

pub mod migrate;
pub mod promote;
pub mod serve;
pub mod storage;
pub mod sweep;

pub use migrate::run_migrate;
pub use promote::run_promote;
pub use serve::run_serve;
pub use storage::run_init_storage;
pub use sweep::run_sweep;

use anyhow::{Context, Result};
use clap::Args;
use pitchhub_server::db::{create_pool_with_options, DEFAULT_MAX_CONNECTIONS};
use sqlx::PgPool;

/// Database connection arguments shared by the database commands
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Database URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Maximum pooled connections
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
}

impl DatabaseArgs {
    pub async fn connect(&self) -> Result<PgPool> {
        create_pool_with_options(&self.database_url, self.max_connections)
            .await
            .context("Failed to create database pool")
    }
}
