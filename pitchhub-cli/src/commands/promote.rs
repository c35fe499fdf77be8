//! Change a user's role
//!
//! The admin role cannot be chosen at sign-up; this is how it is granted.

use anyhow::{Context, Result};
use clap::Parser;

use pitchhub_server::db::UserRepo;
use pitchhub_server::models::UserRole;

use super::DatabaseArgs;

fn parse_role(raw: &str) -> Result<UserRole, String> {
    UserRole::parse(raw).map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
pub struct PromoteArgs {
    /// Email of the account to change
    #[arg(long)]
    pub email: String,

    /// New role (investor, entrepreneur, admin)
    #[arg(long, default_value = "admin", value_parser = parse_role)]
    pub role: UserRole,

    #[command(flatten)]
    pub database: DatabaseArgs,
}

pub async fn run_promote(args: PromoteArgs) -> Result<()> {
    let pool = args.database.connect().await?;
    let user = UserRepo::new(&pool)
        .set_role(&args.email, args.role)
        .await
        .with_context(|| format!("Failed to set role for {}", args.email))?;

    tracing::info!(user_id = %user.id, role = %args.role, "Role changed");
    println!("{} is now {}", user.email, user.role);
    Ok(())
}
