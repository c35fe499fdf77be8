//! Create the upload directory layout

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use pitchhub_server::config::UploadLimits;
use pitchhub_server::storage::MediaStorage;

#[derive(Parser, Debug)]
pub struct InitStorageArgs {
    /// Uploads root directory
    #[arg(long = "uploads", value_name = "DIR", env = "UPLOADS_ROOT", default_value = "uploads")]
    pub root: PathBuf,
}

pub async fn run_init_storage(args: InitStorageArgs) -> Result<()> {
    let storage = MediaStorage::new(args.root, UploadLimits::default());
    storage
        .init()
        .await
        .with_context(|| format!("Failed to initialize {}", storage.root().display()))?;

    println!("Upload storage ready at {}", storage.root().display());
    Ok(())
}
