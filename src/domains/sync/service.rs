use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use log::{error, info, warn};
use tokio::sync::{watch, Mutex, Semaphore};

use crate::domains::household::repository::HouseholdRepository;
use crate::domains::household::types::{HouseholdRecord, SyncedRecordKey};
use crate::domains::sync::remote_store::{RemoteStore, RemoteStoreError};
use crate::domains::sync::status_journal::StatusJournal;
use crate::domains::sync::types::{
    SyncOutcome, SyncProgress, SyncReport, SyncState, SyncStateView, SyncStatusView,
    UploadError, UploadFailureCause, FAILURE_PREFIX, NOTHING_TO_SYNC_MESSAGE,
    PURGE_FAILED_MESSAGE, SUCCESS_MESSAGE,
};
use crate::errors::{DomainError, ServiceError, ServiceResult, SyncError};

/// Trait defining sync service operations
#[async_trait]
pub trait SyncService: Send + Sync {
    /// Upload every queued record and clear them locally if all uploads succeed.
    /// Fails with `SyncError::Busy` while another run is in progress.
    async fn sync_now(&self) -> ServiceResult<SyncReport>;

    async fn status(&self) -> SyncStatusView;

    async fn state(&self) -> SyncStateView;

    fn subscribe_progress(&self) -> watch::Receiver<SyncProgress>;
}

/// Batch uploader from the local household queue to the remote store.
pub struct SyncEngine {
    repo: Arc<dyn HouseholdRepository>,
    remote: Arc<dyn RemoteStore>,
    journal: Arc<StatusJournal>,
    collection: String,
    upload_sem: Arc<Semaphore>,
    running: AtomicBool,
    progress: watch::Sender<SyncProgress>,
    last_report: Mutex<Option<SyncReport>>,
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn sync_error(error: SyncError) -> ServiceError {
    ServiceError::Domain(DomainError::Sync(error))
}

impl From<RemoteStoreError> for UploadFailureCause {
    fn from(error: RemoteStoreError) -> Self {
        match error {
            RemoteStoreError::PermissionDenied => UploadFailureCause::PermissionDenied,
            RemoteStoreError::Unavailable(_) => UploadFailureCause::NetworkUnavailable,
            RemoteStoreError::Other(detail) => UploadFailureCause::Unknown(detail),
        }
    }
}

impl SyncEngine {
    pub fn new(
        repo: Arc<dyn HouseholdRepository>,
        remote: Arc<dyn RemoteStore>,
        journal: Arc<StatusJournal>,
        collection: &str,
        max_parallel_uploads: usize,
    ) -> Self {
        let (progress, _) = watch::channel(SyncProgress::default());
        Self {
            repo,
            remote,
            journal,
            collection: collection.to_string(),
            upload_sem: Arc::new(Semaphore::new(max_parallel_uploads.max(1))),
            running: AtomicBool::new(false),
            progress,
            last_report: Mutex::new(None),
        }
    }

    fn begin_run(&self) -> Result<RunGuard<'_>, SyncError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| RunGuard(&self.running))
            .map_err(|_| SyncError::Busy)
    }

    async fn upload_one(
        &self,
        record: &HouseholdRecord,
        completed: &AtomicUsize,
        total: usize,
    ) -> Result<(), UploadError> {
        let fail = |cause: UploadFailureCause| UploadError { id: record.id.clone(), cause };

        let _permit = self
            .upload_sem
            .acquire()
            .await
            .map_err(|e| fail(UploadFailureCause::Unknown(e.to_string())))?;

        let result = match serde_json::to_value(record) {
            Ok(payload) => self
                .remote
                .add_record(&self.collection, &record.id, &payload)
                .await
                .map_err(UploadFailureCause::from),
            Err(e) => Err(UploadFailureCause::Unknown(e.to_string())),
        };

        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        self.progress.send_replace(SyncProgress { completed: done, total });

        result.map_err(|cause| {
            warn!("Upload of household {} failed: {:?}", record.id, cause);
            fail(cause)
        })
    }

    async fn finish(&self, report: SyncReport) -> SyncReport {
        info!(
            "Sync finished: {:?} ({}/{} uploaded)",
            report.outcome, report.uploaded, report.total
        );
        *self.last_report.lock().await = Some(report.clone());
        report
    }
}

#[async_trait]
impl SyncService for SyncEngine {
    async fn sync_now(&self) -> ServiceResult<SyncReport> {
        let _run = self.begin_run().map_err(|e| {
            warn!("Sync requested while another sync is running");
            sync_error(e)
        })?;
        let started_at = Utc::now();

        let snapshot = self
            .repo
            .snapshot_for_sync()
            .await
            .map_err(|e| sync_error(SyncError::Snapshot(e.to_string())))?;
        let total = snapshot.len();
        info!("Sync started with {} queued households", total);
        self.progress.send_replace(SyncProgress { completed: 0, total });

        if snapshot.is_empty() {
            return Ok(self
                .finish(SyncReport {
                    outcome: SyncOutcome::NothingToSync,
                    total: 0,
                    uploaded: 0,
                    failures: Vec::new(),
                    message: NOTHING_TO_SYNC_MESSAGE.to_string(),
                    purge_error: None,
                    started_at,
                    finished_at: Utc::now(),
                })
                .await);
        }

        let completed = AtomicUsize::new(0);
        let results = join_all(
            snapshot
                .iter()
                .map(|record| self.upload_one(record, &completed, total)),
        )
        .await;

        // join_all keeps input order, so failures stay in snapshot order.
        let failures: Vec<UploadError> = results.into_iter().filter_map(Result::err).collect();
        let uploaded = total - failures.len();

        let (outcome, message, purge_error) = match failures.first() {
            None => {
                let keys: Vec<SyncedRecordKey> = snapshot.iter().map(HouseholdRecord::key).collect();
                match self.repo.purge_synced(&keys).await {
                    Ok(_) => (SyncOutcome::Succeeded, SUCCESS_MESSAGE.to_string(), None),
                    Err(e) => {
                        error!("All households uploaded but local purge failed: {}", e);
                        (
                            SyncOutcome::Failed,
                            format!("{}{}", FAILURE_PREFIX, PURGE_FAILED_MESSAGE),
                            Some(e.to_string()),
                        )
                    }
                }
            }
            Some(first) => {
                let outcome = if uploaded > 0 {
                    SyncOutcome::PartiallyFailed
                } else {
                    SyncOutcome::Failed
                };
                (outcome, format!("{}{}", FAILURE_PREFIX, first.cause.user_message()), None)
            }
        };

        if let Err(e) = self.journal.write(&message).await {
            error!("Failed to record sync status: {}", e);
        }

        Ok(self
            .finish(SyncReport {
                outcome,
                total,
                uploaded,
                failures,
                message,
                purge_error,
                started_at,
                finished_at: Utc::now(),
            })
            .await)
    }

    async fn status(&self) -> SyncStatusView {
        self.journal.view().await
    }

    async fn state(&self) -> SyncStateView {
        let state = if self.running.load(Ordering::SeqCst) {
            SyncState::Syncing
        } else {
            SyncState::Idle
        };
        let progress = *self.progress.borrow();
        SyncStateView {
            state,
            progress,
            last_report: self.last_report.lock().await.clone(),
        }
    }

    fn subscribe_progress(&self) -> watch::Receiver<SyncProgress> {
        self.progress.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::core::kv_store::test_support::{memory_store, FailingWritesStore};
    use crate::domains::core::kv_store::{KeyValueStore, HOUSEHOLDS_KEY, SYNC_STATUS_KEY};
    use crate::domains::household::repository::KvHouseholdRepository;
    use crate::domains::household::types::fixtures::draft;
    use crate::domains::sync::remote_store::mock::MockRemoteStore;
    use crate::domains::sync::types::{
        SyncStatusCategory, NETWORK_UNAVAILABLE_MESSAGE, PERMISSION_DENIED_MESSAGE,
    };

    struct Fixture {
        store: Arc<dyn KeyValueStore>,
        repo: Arc<KvHouseholdRepository>,
        remote: Arc<MockRemoteStore>,
        engine: Arc<SyncEngine>,
    }

    async fn fixture_with(store: Arc<dyn KeyValueStore>, remote: MockRemoteStore) -> Fixture {
        let repo = Arc::new(KvHouseholdRepository::new(store.clone()));
        let remote = Arc::new(remote);
        let journal = Arc::new(StatusJournal::open(store.clone()).await);
        let engine = Arc::new(SyncEngine::new(repo.clone(), remote.clone(), journal, "households", 3));
        Fixture { store, repo, remote, engine }
    }

    async fn fixture() -> Fixture {
        fixture_with(memory_store().await, MockRemoteStore::new()).await
    }

    async fn seed(repo: &KvHouseholdRepository, n: usize) -> Vec<String> {
        let mut ids = Vec::new();
        for i in 0..n {
            ids.push(repo.create(&draft(&format!("Head {}", i))).await.unwrap().id);
        }
        ids
    }

    #[tokio::test]
    async fn test_full_success_uploads_and_clears_queue() {
        let f = fixture().await;
        let ids = seed(&f.repo, 3).await;

        let report = f.engine.sync_now().await.unwrap();
        assert_eq!(report.outcome, SyncOutcome::Succeeded);
        assert_eq!((report.total, report.uploaded), (3, 3));
        assert_eq!(report.message, SUCCESS_MESSAGE);

        let mut uploaded = f.remote.uploaded_ids();
        uploaded.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(uploaded, expected);

        let (collection, _, payload) = f.remote.uploaded.lock().unwrap()[0].clone();
        assert_eq!(collection, "households");
        assert!(payload["povertyScore"].is_number());

        assert_eq!(f.repo.count().await, 0);
        assert!(f.store.get(HOUSEHOLDS_KEY).await.unwrap().is_none());
        let status = f.engine.status().await;
        assert_eq!(status.message.as_deref(), Some(SUCCESS_MESSAGE));
        assert_eq!(status.category, Some(SyncStatusCategory::Success));
        assert_eq!(*f.engine.subscribe_progress().borrow(), SyncProgress { completed: 3, total: 3 });
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_every_record() {
        let f = fixture().await;
        let ids = seed(&f.repo, 3).await;
        f.remote.fail_record(&ids[1], RemoteStoreError::PermissionDenied);

        let report = f.engine.sync_now().await.unwrap();
        assert_eq!(report.outcome, SyncOutcome::PartiallyFailed);
        assert_eq!(report.uploaded, 2);
        assert_eq!(
            report.failures,
            vec![UploadError { id: ids[1].clone(), cause: UploadFailureCause::PermissionDenied }]
        );
        assert_eq!(report.message, format!("Sync failed: {}", PERMISSION_DENIED_MESSAGE));

        assert_eq!(f.repo.count().await, 3);
        let status = f.engine.status().await;
        assert_eq!(status.category, Some(SyncStatusCategory::Failure));
    }

    #[tokio::test]
    async fn test_total_failure_reports_network_cause() {
        let f = fixture().await;
        seed(&f.repo, 2).await;
        f.remote.fail_everything(RemoteStoreError::Unavailable("offline".into()));

        let report = f.engine.sync_now().await.unwrap();
        assert_eq!(report.outcome, SyncOutcome::Failed);
        assert_eq!(report.uploaded, 0);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.message, format!("Sync failed: {}", NETWORK_UNAVAILABLE_MESSAGE));
        assert_eq!(f.repo.count().await, 2);
    }

    #[tokio::test]
    async fn test_first_failure_in_snapshot_order_sets_message() {
        let f = fixture().await;
        seed(&f.repo, 3).await;
        let snapshot = f.repo.snapshot_for_sync().await.unwrap();
        f.remote.fail_record(&snapshot[0].id, RemoteStoreError::Other("HTTP 500".into()));
        f.remote.fail_record(&snapshot[2].id, RemoteStoreError::PermissionDenied);

        let report = f.engine.sync_now().await.unwrap();
        assert_eq!(report.failures[0].id, snapshot[0].id);
        assert_eq!(
            report.message,
            "Sync failed: There was an error while syncing data. Please try again."
        );
    }

    #[tokio::test]
    async fn test_empty_queue_does_not_contact_remote_or_journal() {
        let f = fixture().await;
        let report = f.engine.sync_now().await.unwrap();
        assert_eq!(report.outcome, SyncOutcome::NothingToSync);
        assert!(f.remote.uploaded_ids().is_empty());
        assert!(f.store.get(SYNC_STATUS_KEY).await.unwrap().is_none());
        assert!(f.engine.status().await.message.is_none());
    }

    #[tokio::test]
    async fn test_second_trigger_while_syncing_is_busy() {
        let (remote, gate) = MockRemoteStore::gated();
        let f = fixture_with(memory_store().await, remote).await;
        seed(&f.repo, 2).await;

        let engine = f.engine.clone();
        let running = tokio::spawn(async move { engine.sync_now().await });
        f.remote.upload_started.notified().await;

        assert_eq!(f.engine.state().await.state, SyncState::Syncing);
        let second = f.engine.sync_now().await;
        assert!(matches!(
            second,
            Err(ServiceError::Domain(DomainError::Sync(SyncError::Busy)))
        ));

        gate.add_permits(2);
        let report = running.await.unwrap().unwrap();
        assert_eq!(report.outcome, SyncOutcome::Succeeded);
        assert_eq!(f.remote.uploaded_ids().len(), 2);

        let state = f.engine.state().await;
        assert_eq!(state.state, SyncState::Idle);
        assert_eq!(state.last_report.map(|r| r.outcome), Some(SyncOutcome::Succeeded));
    }

    #[tokio::test]
    async fn test_record_created_during_sync_survives_purge() {
        let (remote, gate) = MockRemoteStore::gated();
        let f = fixture_with(memory_store().await, remote).await;
        seed(&f.repo, 2).await;

        let engine = f.engine.clone();
        let running = tokio::spawn(async move { engine.sync_now().await });
        f.remote.upload_started.notified().await;

        let late = f.repo.create(&draft("Late arrival")).await.unwrap();
        gate.add_permits(2);
        let report = running.await.unwrap().unwrap();

        assert_eq!(report.outcome, SyncOutcome::Succeeded);
        assert!(!f.remote.uploaded_ids().contains(&late.id));
        let left = f.repo.list_valid().await.records;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, late.id);
    }

    #[tokio::test]
    async fn test_purge_failure_is_reported_as_failure() {
        let inner: Arc<dyn KeyValueStore> = memory_store().await;
        let failing = Arc::new(FailingWritesStore::new(inner.clone()));
        let repo = Arc::new(KvHouseholdRepository::new(failing.clone()));
        let remote = Arc::new(MockRemoteStore::new());
        let journal = Arc::new(StatusJournal::open(inner.clone()).await);
        let engine = SyncEngine::new(repo.clone(), remote.clone(), journal, "households", 3);

        seed(&repo, 2).await;
        failing.fail_from_now_on();

        let report = engine.sync_now().await.unwrap();
        assert_eq!(report.outcome, SyncOutcome::Failed);
        assert_eq!(report.uploaded, 2);
        assert!(report.purge_error.is_some());
        assert_eq!(report.message, format!("Sync failed: {}", PURGE_FAILED_MESSAGE));
        assert_eq!(repo.count().await, 2);
        assert_eq!(engine.status().await.category, Some(SyncStatusCategory::Failure));
    }

    #[tokio::test]
    async fn test_corrupt_queue_is_an_error_not_nothing_to_sync() {
        let f = fixture().await;
        f.store.set(HOUSEHOLDS_KEY, b"[{broken").await.unwrap();

        let result = f.engine.sync_now().await;
        assert!(matches!(
            result,
            Err(ServiceError::Domain(DomainError::Sync(SyncError::Snapshot(_))))
        ));
        assert!(f.remote.uploaded_ids().is_empty());
        // The run flag is released after an error.
        assert_eq!(f.engine.state().await.state, SyncState::Idle);
    }
}
