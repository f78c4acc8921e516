use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use sqlx::SqlitePool;

use crate::errors::{DbError, DbResult};

/// Key holding the serialized household collection.
pub const HOUSEHOLDS_KEY: &str = "households";
/// Key holding the last sync outcome message.
pub const SYNC_STATUS_KEY: &str = "syncStatus";

/// Durable key-value persistence for raw blobs.
///
/// Each call is independent: no transaction spans two keys or two calls.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Raw bytes stored under `key`, or `None` when the key is absent.
    async fn get(&self, key: &str) -> DbResult<Option<Vec<u8>>>;

    /// Overwrite the value under `key`.
    async fn set(&self, key: &str, value: &[u8]) -> DbResult<()>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> DbResult<()>;
}

/// `KeyValueStore` backed by the `kv_store` SQLite table.
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> DbResult<Option<Vec<u8>>> {
        let value = sqlx::query_scalar::<_, Vec<u8>>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8]) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        debug!("kv_store: wrote {} bytes under '{}'", value.len(), key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        debug!("kv_store: removed '{}' ({} row(s))", key, result.rows_affected());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Fresh in-memory database with the schema applied.
    pub async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db_migration::initialize_database(&pool).await.unwrap();
        pool
    }

    pub async fn memory_store() -> Arc<SqliteKeyValueStore> {
        Arc::new(SqliteKeyValueStore::new(memory_pool().await))
    }

    /// Wraps a store and fails every write once `fail_writes` is switched on.
    pub struct FailingWritesStore {
        pub inner: Arc<dyn KeyValueStore>,
        pub fail_writes: AtomicBool,
    }

    impl FailingWritesStore {
        pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
            Self { inner, fail_writes: AtomicBool::new(false) }
        }

        pub fn fail_from_now_on(&self) {
            self.fail_writes.store(true, Ordering::SeqCst);
        }

        fn check(&self) -> DbResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(DbError::Other("disk I/O error".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl KeyValueStore for FailingWritesStore {
        async fn get(&self, key: &str) -> DbResult<Option<Vec<u8>>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &[u8]) -> DbResult<()> {
            self.check()?;
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> DbResult<()> {
            self.check()?;
            self.inner.remove(key).await
        }
    }
}
