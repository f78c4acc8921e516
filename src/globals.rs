use crate::config::CoreConfig;
use crate::domains::core::kv_store::{KeyValueStore, SqliteKeyValueStore};
use crate::domains::household::repository::{HouseholdRepository, KvHouseholdRepository};
use crate::domains::household::service::{HouseholdService, HouseholdServiceImpl};
use crate::domains::sync::remote_store::{FirestoreRemoteStore, RemoteStore};
use crate::domains::sync::service::{SyncEngine, SyncService};
use crate::domains::sync::status_journal::StatusJournal;
use crate::ffi::error::{FFIError, FFIResult};
use lazy_static::lazy_static;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// Global state definitions
lazy_static! {
    static ref INIT_MUTEX: tokio::sync::Mutex<()> = tokio::sync::Mutex::new(());
    static ref INITIALIZED: AtomicBool = AtomicBool::new(false);

    static ref DB_POOL: Mutex<Option<SqlitePool>> = Mutex::new(None);

    // Household Domain
    static ref HOUSEHOLD_SERVICE: Mutex<Option<Arc<dyn HouseholdService>>> = Mutex::new(None);

    // ---- Sync ----
    static ref SYNC_SERVICE: Mutex<Option<Arc<dyn SyncService>>> = Mutex::new(None);
}

fn read_global<T: Clone>(slot: &Mutex<Option<T>>, name: &str) -> FFIResult<T> {
    slot.lock()
        .map_err(|_| FFIError::internal(format!("{} lock poisoned", name)))?
        .clone()
        .ok_or_else(FFIError::not_initialized)
}

fn store_global<T>(slot: &Mutex<Option<T>>, name: &str, value: T) -> FFIResult<()> {
    *slot
        .lock()
        .map_err(|_| FFIError::internal(format!("{} lock poisoned", name)))? = Some(value);
    Ok(())
}

// --- Getter Functions ---

pub fn get_db_pool() -> FFIResult<SqlitePool> {
    read_global(&*DB_POOL, "DB_POOL")
}
pub fn get_household_service() -> FFIResult<Arc<dyn HouseholdService>> {
    read_global(&*HOUSEHOLD_SERVICE, "HOUSEHOLD_SERVICE")
}
pub fn get_sync_service() -> FFIResult<Arc<dyn SyncService>> {
    read_global(&*SYNC_SERVICE, "SYNC_SERVICE")
}

/// Initialize logging, the database and every service. Later calls are no-ops.
pub async fn initialize(config: CoreConfig) -> FFIResult<()> {
    let remote: Arc<dyn RemoteStore> =
        Arc::new(FirestoreRemoteStore::new(&config.remote).map_err(FFIError::from_service_error)?);
    initialize_with_remote(config, remote).await
}

/// Same as `initialize`, with a caller-supplied remote store.
pub async fn initialize_with_remote(config: CoreConfig, remote: Arc<dyn RemoteStore>) -> FFIResult<()> {
    // Acquire the async mutex to ensure single initialization
    let _guard = INIT_MUTEX.lock().await;

    if INITIALIZED.load(Ordering::Acquire) {
        log::debug!("Core already initialized; ignoring repeated initialization");
        return Ok(());
    }

    let result = initialize_internal(config, remote).await;
    if result.is_ok() {
        INITIALIZED.store(true, Ordering::Release);
    }
    result
}

async fn initialize_internal(config: CoreConfig, remote: Arc<dyn RemoteStore>) -> FFIResult<()> {
    // Initialize logging first
    if std::env::var("RUST_LOG").is_err() {
        #[cfg(debug_assertions)]
        std::env::set_var("RUST_LOG", "debug");
        #[cfg(not(debug_assertions))]
        std::env::set_var("RUST_LOG", "info");
    }
    let _ = env_logger::try_init();

    config.validate().map_err(FFIError::from_service_error)?;
    log::info!("Starting core initialization");
    log::debug!("Database URL: {}", config.database_url);
    log::debug!(
        "Remote collection: {} (project '{}')",
        config.remote.collection,
        config.remote.project_id
    );

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            log::error!("Database connection failed: {}", e);
            FFIError::internal(format!("Database connection failed: {}", e))
        })?;

    crate::db_migration::initialize_database(&pool).await.map_err(|e| {
        log::error!("Database initialization failed: {}", e);
        FFIError::from(e)
    })?;
    log::info!("Database ready");

    let kv_store: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::new(pool.clone()));
    let journal = Arc::new(StatusJournal::open(kv_store.clone()).await);
    let household_repo: Arc<dyn HouseholdRepository> = Arc::new(KvHouseholdRepository::new(kv_store));
    let household_service: Arc<dyn HouseholdService> =
        Arc::new(HouseholdServiceImpl::new(household_repo.clone(), journal.clone()));
    let sync_service: Arc<dyn SyncService> = Arc::new(SyncEngine::new(
        household_repo,
        remote,
        journal,
        &config.remote.collection,
        config.sync.max_parallel_uploads,
    ));

    store_global(&*DB_POOL, "DB_POOL", pool)?;
    store_global(&*HOUSEHOLD_SERVICE, "HOUSEHOLD_SERVICE", household_service)?;
    store_global(&*SYNC_SERVICE, "SYNC_SERVICE", sync_service)?;

    log::info!("Core initialization complete");
    Ok(())
}
