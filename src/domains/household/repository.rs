use crate::domains::core::kv_store::{KeyValueStore, HOUSEHOLDS_KEY};
use crate::domains::household::scoring::calculate_poverty_score;
use crate::domains::household::types::{
    stored_id, HouseholdRecord, LoadedHouseholds, NewHousehold, SyncedRecordKey,
};
use crate::errors::{DomainError, DomainResult};
use crate::types::{PaginatedResult, PaginationParams};
use crate::validation::Validate;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use log::{debug, info, warn};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Layout version written into the stored collection envelope.
pub const HOUSEHOLDS_SCHEMA_VERSION: u64 = 1;

/// Trait defining household repository operations
#[async_trait]
pub trait HouseholdRepository: Send + Sync {
    /// Valid records, newest first. Never fails; a load failure is reported alongside
    /// an empty list.
    async fn list_valid(&self) -> LoadedHouseholds;

    async fn create(&self, draft: &NewHousehold) -> DomainResult<HouseholdRecord>;

    async fn update(&self, id: &str, draft: &NewHousehold) -> DomainResult<HouseholdRecord>;

    /// Deleting an unknown id succeeds without writing.
    async fn delete(&self, id: &str) -> DomainResult<()>;

    async fn count(&self) -> usize;

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<HouseholdRecord>>;

    async fn list_page(&self, params: PaginationParams) -> (PaginatedResult<HouseholdRecord>, Option<DomainError>);

    /// Records to upload. Unlike `list_valid`, a load failure is an error.
    async fn snapshot_for_sync(&self) -> DomainResult<Vec<HouseholdRecord>>;

    /// Remove the given record versions; returns how many were removed.
    async fn purge_synced(&self, keys: &[SyncedRecordKey]) -> DomainResult<usize>;
}

/// Household repository over the key-value store. The whole collection lives under
/// a single key and every mutation rewrites it.
pub struct KvHouseholdRepository {
    store: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl KvHouseholdRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Raw stored entries in storage order, including ones that are not valid records.
    async fn load_entries(&self) -> DomainResult<Vec<Value>> {
        let bytes = self
            .store
            .get(HOUSEHOLDS_KEY)
            .await
            .map_err(|e| DomainError::Load(e.to_string()))?;
        match bytes {
            None => Ok(Vec::new()),
            Some(bytes) => decode_collection(&bytes).map_err(DomainError::Load),
        }
    }

    async fn save_entries(&self, entries: Vec<Value>) -> DomainResult<()> {
        let bytes = encode_collection(entries)?;
        self.store.set(HOUSEHOLDS_KEY, &bytes).await?;
        Ok(())
    }

    async fn load_valid(&self) -> DomainResult<Vec<HouseholdRecord>> {
        let entries = self.load_entries().await?;
        let mut records: Vec<HouseholdRecord> =
            entries.iter().filter_map(HouseholdRecord::from_stored).collect();
        if records.len() != entries.len() {
            debug!(
                "Skipped {} invalid household entries",
                entries.len() - records.len()
            );
        }
        // Stable sort keeps insertion order among equal timestamps.
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }
}

fn decode_collection(bytes: &[u8]) -> Result<Vec<Value>, String> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    match value {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut envelope) => {
            let version = envelope
                .get("schemaVersion")
                .and_then(Value::as_u64)
                .ok_or_else(|| "missing schemaVersion".to_string())?;
            if version > HOUSEHOLDS_SCHEMA_VERSION {
                return Err(format!(
                    "schemaVersion {} is newer than supported version {}",
                    version, HOUSEHOLDS_SCHEMA_VERSION
                ));
            }
            match envelope.remove("records") {
                Some(Value::Array(entries)) => Ok(entries),
                _ => Err("records is not an array".to_string()),
            }
        }
        _ => Err("unrecognized collection layout".to_string()),
    }
}

fn encode_collection(entries: Vec<Value>) -> DomainResult<Vec<u8>> {
    let envelope = json!({
        "schemaVersion": HOUSEHOLDS_SCHEMA_VERSION,
        "records": entries,
    });
    serde_json::to_vec(&envelope).map_err(|e| DomainError::Internal(e.to_string()))
}

fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// A modification timestamp that is strictly after `previous`.
fn next_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = now_millis();
    match previous {
        Some(prev) if now <= prev => prev + Duration::milliseconds(1),
        _ => now,
    }
}

fn build_record(
    id: String,
    draft: &NewHousehold,
    timestamp: DateTime<Utc>,
    extra: Map<String, Value>,
) -> HouseholdRecord {
    HouseholdRecord {
        id,
        sub_location: draft.sub_location.clone().unwrap_or_default(),
        village: draft.village.clone().unwrap_or_default(),
        head_details: draft.head_details.clone(),
        household_details: draft.household_details.clone(),
        assessment_answers: draft.assessment_answers.clone(),
        poverty_score: calculate_poverty_score(&draft.assessment_answers),
        photo: draft.photo.clone(),
        geo_coordinates: draft.geo_coordinates,
        timestamp: Some(timestamp),
        extra,
    }
}

fn to_entry(record: &HouseholdRecord) -> DomainResult<Value> {
    serde_json::to_value(record).map_err(|e| DomainError::Internal(e.to_string()))
}

#[async_trait]
impl HouseholdRepository for KvHouseholdRepository {
    async fn list_valid(&self) -> LoadedHouseholds {
        match self.load_valid().await {
            Ok(records) => LoadedHouseholds { records, load_error: None },
            Err(e) => {
                warn!("Household list unavailable: {}", e);
                LoadedHouseholds { records: Vec::new(), load_error: Some(e) }
            }
        }
    }

    async fn create(&self, draft: &NewHousehold) -> DomainResult<HouseholdRecord> {
        if let Err(e) = draft.validate() {
            debug!("Rejected new household: {}", e);
            return Err(e);
        }

        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_entries().await?;

        let taken: HashSet<String> = entries.iter().filter_map(stored_id).collect();
        let mut id = Uuid::new_v4().to_string();
        while taken.contains(&id) {
            id = Uuid::new_v4().to_string();
        }

        let record = build_record(id, draft, now_millis(), Map::new());
        entries.push(to_entry(&record)?);
        self.save_entries(entries).await?;

        info!("Created household {} (score {})", record.id, record.poverty_score);
        Ok(record)
    }

    async fn update(&self, id: &str, draft: &NewHousehold) -> DomainResult<HouseholdRecord> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_entries().await?;

        let (index, existing) = entries
            .iter()
            .enumerate()
            .find_map(|(i, entry)| {
                HouseholdRecord::from_stored(entry)
                    .filter(|r| r.id == id)
                    .map(|r| (i, r))
            })
            .ok_or_else(|| DomainError::EntityNotFound("Household".to_string(), id.to_string()))?;

        let mut draft = draft.clone();
        if draft.geo_coordinates.is_none() {
            draft.geo_coordinates = existing.geo_coordinates;
        }
        if let Err(e) = draft.validate() {
            debug!("Rejected update of household {}: {}", id, e);
            return Err(e);
        }

        let timestamp = next_timestamp(existing.timestamp);
        let record = build_record(existing.id, &draft, timestamp, existing.extra);
        entries[index] = to_entry(&record)?;
        self.save_entries(entries).await?;

        info!("Updated household {} (score {})", record.id, record.poverty_score);
        Ok(record)
    }

    async fn delete(&self, id: &str) -> DomainResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_entries().await?;

        let before = entries.len();
        entries.retain(|entry| stored_id(entry).as_deref() != Some(id));
        if entries.len() == before {
            debug!("Delete of unknown household {} ignored", id);
            return Ok(());
        }

        self.save_entries(entries).await?;
        info!("Deleted household {}", id);
        Ok(())
    }

    async fn count(&self) -> usize {
        self.list_valid().await.records.len()
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<HouseholdRecord>> {
        let records = self.load_valid().await?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    async fn list_page(&self, params: PaginationParams) -> (PaginatedResult<HouseholdRecord>, Option<DomainError>) {
        let loaded = self.list_valid().await;
        (PaginatedResult::from_sorted(loaded.records, params), loaded.load_error)
    }

    async fn snapshot_for_sync(&self) -> DomainResult<Vec<HouseholdRecord>> {
        self.load_valid().await
    }

    async fn purge_synced(&self, keys: &[SyncedRecordKey]) -> DomainResult<usize> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_entries().await?;

        let synced: HashSet<&SyncedRecordKey> = keys.iter().collect();
        let before = entries.len();
        entries.retain(|entry| {
            HouseholdRecord::from_stored(entry)
                .map_or(true, |record| !synced.contains(&record.key()))
        });
        let removed = before - entries.len();

        if removed == 0 {
            return Ok(0);
        }
        if entries.is_empty() {
            self.store.remove(HOUSEHOLDS_KEY).await?;
        } else {
            let kept = entries.len();
            self.save_entries(entries).await?;
            info!("{} household entries kept after purge", kept);
        }
        info!("Purged {} synced households", removed);
        Ok(removed)
    }
}
