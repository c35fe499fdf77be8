//! Apply the database schema

use anyhow::{Context, Result};
use clap::Parser;

use pitchhub_server::db::migrations;

use super::DatabaseArgs;

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,
}

pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let pool = args.database.connect().await?;
    migrations::run(&pool)
        .await
        .context("Failed to apply migrations")?;

    println!("Schema is up to date");
    Ok(())
}
