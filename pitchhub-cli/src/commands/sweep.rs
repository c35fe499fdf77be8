//! One-off token blacklist sweep

use anyhow::{Context, Result};
use clap::Parser;

use pitchhub_server::sweep::sweep_once;

use super::DatabaseArgs;

#[derive(Parser, Debug)]
pub struct SweepArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,
}

pub async fn run_sweep(args: SweepArgs) -> Result<()> {
    let pool = args.database.connect().await?;
    let removed = sweep_once(&pool)
        .await
        .context("Blacklist sweep failed")?;

    println!("Removed {} expired blacklist entries", removed);
    Ok(())
}
