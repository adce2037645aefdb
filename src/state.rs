//! Process-wide handles to the KV store, delayed-job scheduler, debounce
//! coordinator, and storage root (spec.md section 9, "Module-level DB
//! session / singleton KV" — the core's own components still take these as
//! explicit constructor arguments; this module is the one place, at the
//! process-wiring boundary, that builds them once and hands out `Arc`s,
//! the same role `AppContext` itself plays for `db`).
//!
//! Initialized once from `initializers::core_services::CoreServicesInitializer`
//! during `before_run`; workers read it back via `state::get()`.

use std::sync::{Arc, OnceLock};

use redis::aio::ConnectionManager;

use crate::common::settings::Settings;
use crate::debounce::{ClusterJobScheduler, DebounceConfig, DebounceCoordinator, RedisClusterScheduler};
use crate::errors::CoreError;
use crate::kv::{KvStore, RedisKv};
use crate::storage::Storage;

pub struct CoreServices {
    pub debounce: Arc<DebounceCoordinator>,
    pub scheduler: Arc<RedisClusterScheduler>,
    pub storage: Storage,
    pub settings: Settings,
}

static SERVICES: OnceLock<Arc<CoreServices>> = OnceLock::new();

/// Builds the shared Redis connections and coordinator once per process.
/// Safe to call more than once (e.g. from tests); later calls are no-ops
/// and return the first-built instance.
///
/// # Errors
/// Returns `CoreError::Fatal` if Redis can't be reached (spec.md section 7,
/// `FatalConfig` — the worker should abort at startup).
pub async fn init(settings: Settings) -> Result<Arc<CoreServices>, CoreError> {
    if let Some(existing) = SERVICES.get() {
        return Ok(existing.clone());
    }

    let kv: Arc<dyn KvStore> = Arc::new(
        RedisKv::connect(&settings.redis_url)
            .await
            .map_err(|e| CoreError::Fatal(e.to_string()))?,
    );

    let client = redis::Client::open(settings.redis_url.as_str())
        .map_err(|e| CoreError::Fatal(e.to_string()))?;
    let conn = ConnectionManager::new(client)
        .await
        .map_err(|e| CoreError::Fatal(e.to_string()))?;
    let scheduler = Arc::new(RedisClusterScheduler::new(conn));

    let debounce_config = DebounceConfig {
        debounce_ttl: settings.debounce_ttl(),
        retry_delay: settings.retry_delay(),
        max_retries: settings.cluster_max_retries,
    };
    let scheduler_as_trait: Arc<dyn ClusterJobScheduler> = scheduler.clone();
    let debounce = Arc::new(DebounceCoordinator::new(kv, scheduler_as_trait, debounce_config));

    let services = Arc::new(CoreServices {
        debounce,
        scheduler,
        storage: Storage::new(settings.storage_root.clone().into()),
        settings,
    });

    Ok(SERVICES.get_or_init(|| services).clone())
}

/// # Panics
/// If called before `init` has run (the initializer must run before any
/// worker `perform` call).
#[must_use]
pub fn get() -> Arc<CoreServices> {
    SERVICES
        .get()
        .expect("CoreServices not initialized; CoreServicesInitializer must run first")
        .clone()
}
