use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SUCCESS_MESSAGE: &str = "Successfully synced all data to the remote store!";
pub const PERMISSION_DENIED_MESSAGE: &str = "Remote store permission denied. Please check database rules.";
pub const NETWORK_UNAVAILABLE_MESSAGE: &str = "Network unavailable. Please check your internet connection.";
pub const UNKNOWN_ERROR_MESSAGE: &str = "There was an error while syncing data. Please try again.";
pub const PURGE_FAILED_MESSAGE: &str =
    "Data was uploaded but local records could not be cleared. Please try again.";
pub const NOTHING_TO_SYNC_MESSAGE: &str = "No household data found to sync.";
pub const FAILURE_PREFIX: &str = "Sync failed: ";

/// Whether the engine is currently running a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    Idle,
    Syncing,
}

/// Terminal result of one sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    Succeeded,
    PartiallyFailed,
    Failed,
    NothingToSync,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum UploadFailureCause {
    PermissionDenied,
    NetworkUnavailable,
    Unknown(String),
}

impl UploadFailureCause {
    /// Text shown to the user. Details of unknown failures stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            UploadFailureCause::PermissionDenied => PERMISSION_DENIED_MESSAGE,
            UploadFailureCause::NetworkUnavailable => NETWORK_UNAVAILABLE_MESSAGE,
            UploadFailureCause::Unknown(_) => UNKNOWN_ERROR_MESSAGE,
        }
    }
}

/// One record that could not be uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadError {
    pub id: String,
    pub cause: UploadFailureCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncProgress {
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    pub total: usize,
    pub uploaded: usize,
    pub failures: Vec<UploadError>,
    pub message: String,
    /// Set when every upload succeeded but clearing local records did not.
    pub purge_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatusCategory {
    Success,
    Failure,
}

impl SyncStatusCategory {
    pub fn from_message(message: &str) -> Self {
        if message.to_lowercase().contains("failed") {
            SyncStatusCategory::Failure
        } else {
            SyncStatusCategory::Success
        }
    }
}

/// Last persisted sync message with its derived category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusView {
    pub message: Option<String>,
    pub category: Option<SyncStatusCategory>,
}

impl SyncStatusView {
    pub fn from_message(message: Option<String>) -> Self {
        let category = message.as_deref().map(SyncStatusCategory::from_message);
        Self { message, category }
    }
}

/// Live engine state for the sync screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStateView {
    pub state: SyncState,
    pub progress: SyncProgress,
    pub last_report: Option<SyncReport>,
}
