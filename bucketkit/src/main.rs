//! bucketkit - bucket and object utilities for S3-compatible stores
//!
//! Creates public buckets, lists, uploads and removes objects, and hands out
//! presigned URLs against the store named in `bucketkit.toml` or the
//! `BUCKETKIT_STORE__*` environment variables.

mod cli;
mod commands;

use anyhow::Context;
use bucketkit_core::{Settings, StoreSettings};
use bucketkit_s3::{init_shared, ops_for, EphemeralStore, ObjectStore};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("bucketkit={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (store, settings): (Arc<dyn ObjectStore>, StoreSettings) = if args.ephemeral {
        info!("Using an ephemeral in-memory store");
        let store: Arc<dyn ObjectStore> = Arc::new(EphemeralStore::new());
        (store, StoreSettings::default())
    } else {
        let settings = Settings::load_from(args.config.as_deref())
            .context("failed to load settings")?
            .store;
        let store: Arc<dyn ObjectStore> = init_shared(&settings)
            .await
            .context("failed to connect to the object store")?;
        (store, settings)
    };

    let ops = ops_for(store, Some(&settings));
    let mut stdout = std::io::stdout().lock();
    commands::run(&ops, args.command, &mut stdout).await
}
