//! Process-wide store handle, built on first use

use bucketkit_core::{Settings, StoreError, StoreSettings};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::ops::StoreOps;
use crate::storage::{ObjectStore, S3Store};

/// A store handle constructed at most once
///
/// Concurrent first callers race to [`SharedStore::get_or_try_init`]; one of
/// them runs the constructor while the others wait, and all of them observe
/// the same handle. A failed construction leaves the cell empty so a later
/// call can try again.
pub struct SharedStore<S> {
    cell: OnceCell<Arc<S>>,
}

impl<S> Default for SharedStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SharedStore<S> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    /// The handle, if it has been built
    pub fn get(&self) -> Option<Arc<S>> {
        self.cell.get().cloned()
    }

    pub async fn get_or_try_init<F, Fut>(&self, init: F) -> Result<Arc<S>, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, StoreError>>,
    {
        self.cell
            .get_or_try_init(|| async move { init().await.map(Arc::new) })
            .await
            .cloned()
    }
}

/// The shared client together with the settings it was built from
struct Connection {
    store: Arc<S3Store>,
    settings: StoreSettings,
}

static SHARED: SharedStore<Connection> = SharedStore::new();

async fn shared_connection() -> Result<Arc<Connection>, StoreError> {
    SHARED
        .get_or_try_init(|| async {
            let settings = Settings::load()?;
            connect(settings.store).await
        })
        .await
}

/// The process-wide store, built from [`Settings::load`] on first use
pub async fn shared_store() -> Result<Arc<S3Store>, StoreError> {
    Ok(Arc::clone(&shared_connection().await?.store))
}

/// The process-wide store, built from `settings` unless some earlier call
/// already built it
pub async fn init_shared(settings: &StoreSettings) -> Result<Arc<S3Store>, StoreError> {
    let connection = SHARED
        .get_or_try_init(|| connect(settings.clone()))
        .await?;
    Ok(Arc::clone(&connection.store))
}

/// Operations over the process-wide store, with the default expiry of the
/// settings that built it
pub async fn shared_ops() -> Result<StoreOps<S3Store>, StoreError> {
    let connection = shared_connection().await?;
    Ok(ops_for(
        Arc::clone(&connection.store),
        Some(&connection.settings),
    ))
}

/// Wrap a store in [`StoreOps`], applying the configured default expiry
pub fn ops_for<S: ObjectStore + ?Sized>(
    store: Arc<S>,
    settings: Option<&StoreSettings>,
) -> StoreOps<S> {
    let ops = StoreOps::new(store);
    match settings {
        Some(settings) => ops.with_default_expiry(settings.presign_expiry()),
        None => ops,
    }
}

async fn connect(settings: StoreSettings) -> Result<Connection, StoreError> {
    let store = S3Store::connect(&settings).await?;
    info!(
        endpoint = settings.endpoint.as_deref().unwrap_or("<aws default>"),
        region = %settings.region,
        "Connected object store client"
    );
    Ok(Connection {
        store: Arc::new(store),
        settings,
    })
}
