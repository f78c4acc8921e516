// Public modules
pub mod config;
pub mod domains;
pub mod errors;
pub mod ffi;
pub mod globals;
pub mod types;
pub mod validation;

// Private modules
mod db_migration;

pub use config::CoreConfig;

/// Initialize the library from a configuration.
/// This function must be called before any other function in the library.
pub async fn initialize(config: CoreConfig) -> ffi::FFIResult<()> {
    globals::initialize(config).await
}

/// Get a reference to the SQLite connection pool
/// This is primarily for internal use
pub fn get_db_pool() -> ffi::FFIResult<sqlx::SqlitePool> {
    globals::get_db_pool()
}
