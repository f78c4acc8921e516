use crate::domains::core::kv_store::{KeyValueStore, SYNC_STATUS_KEY};
use crate::domains::sync::types::SyncStatusView;
use crate::errors::DbResult;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The single persisted "last sync outcome" message.
///
/// The stored value is read once when the journal is opened; afterwards the cache
/// tracks every write, so readers never hit the store.
pub struct StatusJournal {
    store: Arc<dyn KeyValueStore>,
    cached: Mutex<Option<String>>,
}

impl StatusJournal {
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let cached = match store.get(SYNC_STATUS_KEY).await {
            Ok(Some(bytes)) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Ok(None) => None,
            Err(e) => {
                warn!("Could not read last sync status: {}", e);
                None
            }
        };
        Self {
            store,
            cached: Mutex::new(cached),
        }
    }

    pub async fn read(&self) -> Option<String> {
        self.cached.lock().await.clone()
    }

    /// Replace the stored message.
    pub async fn write(&self, message: &str) -> DbResult<()> {
        let mut cached = self.cached.lock().await;
        self.store.set(SYNC_STATUS_KEY, message.as_bytes()).await?;
        *cached = Some(message.to_string());
        debug!("Sync status recorded: {}", message);
        Ok(())
    }

    pub async fn view(&self) -> SyncStatusView {
        SyncStatusView::from_message(self.read().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::core::kv_store::test_support::memory_store;
    use crate::domains::sync::types::SyncStatusCategory;

    #[tokio::test]
    async fn test_fresh_journal_is_empty() {
        let journal = StatusJournal::open(memory_store().await).await;
        assert!(journal.read().await.is_none());
        assert!(journal.view().await.category.is_none());
    }

    #[tokio::test]
    async fn test_write_overwrites_and_persists() {
        let store = memory_store().await;
        let journal = StatusJournal::open(store.clone()).await;
        journal.write("Sync failed: Network unavailable.").await.unwrap();
        journal.write("Successfully synced all data to the remote store!").await.unwrap();

        let reopened = StatusJournal::open(store).await;
        let view = reopened.view().await;
        assert_eq!(view.message.as_deref(), Some("Successfully synced all data to the remote store!"));
        assert_eq!(view.category, Some(SyncStatusCategory::Success));
    }

    #[tokio::test]
    async fn test_cache_is_read_once_at_open() {
        let store = memory_store().await;
        store.set(SYNC_STATUS_KEY, b"Sync failed: earlier").await.unwrap();
        let journal = StatusJournal::open(store.clone()).await;

        store.set(SYNC_STATUS_KEY, b"changed behind our back").await.unwrap();
        assert_eq!(journal.read().await.as_deref(), Some("Sync failed: earlier"));
    }
}
