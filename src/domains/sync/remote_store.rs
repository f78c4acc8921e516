use crate::config::RemoteConfig;
use crate::errors::{ServiceError, ServiceResult};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Fields the remote store fills with its own clock when a record is written.
pub const SERVER_TIMESTAMP_FIELDS: &[&str] = &["createdAt", "syncedAt"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteStoreError {
    #[error("permission denied by remote store")]
    PermissionDenied,

    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("remote store error: {0}")]
    Other(String),
}

/// Document store that receives uploaded records.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Write `payload` as the document `record_id` of `collection`, asking the store to
    /// stamp every field in `SERVER_TIMESTAMP_FIELDS` with its own time. Writing the same
    /// id again replaces the document.
    async fn add_record(&self, collection: &str, record_id: &str, payload: &Value) -> Result<(), RemoteStoreError>;
}

/// `RemoteStore` backed by the Firestore REST API (`documents:commit`).
pub struct FirestoreRemoteStore {
    client: Client,
    base_url: String,
    project_id: String,
    api_key: Option<String>,
}

impl FirestoreRemoteStore {
    pub fn new(config: &RemoteConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)", self.project_id)
    }

    /// Resource names travel in the JSON body, so the id is used as is.
    fn document_name(&self, collection: &str, record_id: &str) -> String {
        format!("{}/documents/{}/{}", self.database_path(), collection, record_id)
    }

    fn commit_url(&self) -> String {
        let url = format!("{}/{}/documents:commit", self.base_url, self.database_path());
        match &self.api_key {
            Some(key) => format!("{}?key={}", url, urlencoding::encode(key)),
            None => url,
        }
    }

    fn commit_body(&self, collection: &str, record_id: &str, payload: &Value) -> Value {
        let fields = match payload {
            Value::Object(map) => encode_fields(map),
            other => {
                let mut wrapped = Map::new();
                wrapped.insert("value".to_string(), other.clone());
                encode_fields(&wrapped)
            }
        };
        let transforms: Vec<Value> = SERVER_TIMESTAMP_FIELDS
            .iter()
            .map(|field| json!({ "fieldPath": field, "setToServerValue": "REQUEST_TIME" }))
            .collect();

        json!({
            "writes": [{
                "update": {
                    "name": self.document_name(collection, record_id),
                    "fields": fields,
                },
                "updateTransforms": transforms,
            }]
        })
    }
}

#[async_trait]
impl RemoteStore for FirestoreRemoteStore {
    async fn add_record(&self, collection: &str, record_id: &str, payload: &Value) -> Result<(), RemoteStoreError> {
        check_document_id(record_id)?;
        debug!("Uploading record {} to collection '{}'", record_id, collection);

        let response = self
            .client
            .post(self.commit_url())
            .json(&self.commit_body(collection, record_id, payload))
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to get error details".to_string());
        let error = classify_failure(status, &body);
        warn!("Upload of record {} rejected ({}): {}", record_id, status, body);
        Err(error)
    }
}

/// A slash would address a subcollection instead of the record's own document.
fn check_document_id(record_id: &str) -> Result<(), RemoteStoreError> {
    if record_id.is_empty() || record_id.contains('/') {
        return Err(RemoteStoreError::Other(format!(
            "'{}' cannot be used as a document id",
            record_id
        )));
    }
    Ok(())
}

fn classify_transport_error(error: reqwest::Error) -> RemoteStoreError {
    if error.is_connect() || error.is_timeout() {
        RemoteStoreError::Unavailable(error.to_string())
    } else {
        RemoteStoreError::Other(error.to_string())
    }
}

/// Map an unsuccessful HTTP response to an error kind, preferring the gRPC status
/// string in the body over the HTTP status code.
pub fn classify_failure(status: StatusCode, body: &str) -> RemoteStoreError {
    let grpc_status = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/status").and_then(Value::as_str).map(str::to_string));

    match grpc_status.as_deref() {
        Some("PERMISSION_DENIED") | Some("UNAUTHENTICATED") => return RemoteStoreError::PermissionDenied,
        Some("UNAVAILABLE") => return RemoteStoreError::Unavailable(body.to_string()),
        _ => {}
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteStoreError::PermissionDenied,
        StatusCode::SERVICE_UNAVAILABLE => RemoteStoreError::Unavailable(format!("HTTP {}", status)),
        _ => RemoteStoreError::Other(format!("HTTP {}: {}", status, body)),
    }
}

fn encode_fields(map: &Map<String, Value>) -> Value {
    let fields: Map<String, Value> = map
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect();
    Value::Object(fields)
}

/// Encode plain JSON as a Firestore typed value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // Firestore carries 64-bit integers as decimal strings.
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::sync::{Notify, Semaphore};

    /// In-memory remote store. Uploads can be made to fail per record id, and can be
    /// held at a gate until the test releases them.
    #[derive(Default)]
    pub struct MockRemoteStore {
        pub uploaded: Mutex<Vec<(String, String, Value)>>,
        pub failures: Mutex<HashMap<String, RemoteStoreError>>,
        pub fail_all: Mutex<Option<RemoteStoreError>>,
        pub upload_started: Arc<Notify>,
        pub gate: Option<Arc<Semaphore>>,
    }

    impl MockRemoteStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Uploads wait for a permit on the returned semaphore.
        pub fn gated() -> (Self, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            let store = Self {
                gate: Some(gate.clone()),
                ..Self::default()
            };
            (store, gate)
        }

        pub fn fail_record(&self, id: &str, error: RemoteStoreError) {
            self.failures.lock().unwrap().insert(id.to_string(), error);
        }

        pub fn fail_everything(&self, error: RemoteStoreError) {
            *self.fail_all.lock().unwrap() = Some(error);
        }

        pub fn uploaded_ids(&self) -> Vec<String> {
            self.uploaded.lock().unwrap().iter().map(|(_, id, _)| id.clone()).collect()
        }
    }

    #[async_trait]
    impl RemoteStore for MockRemoteStore {
        async fn add_record(&self, collection: &str, record_id: &str, payload: &Value) -> Result<(), RemoteStoreError> {
            self.upload_started.notify_one();
            if let Some(gate) = &self.gate {
                gate.acquire().await.map_err(|e| RemoteStoreError::Other(e.to_string()))?.forget();
            }

            if let Some(error) = self.fail_all.lock().unwrap().clone() {
                return Err(error);
            }
            if let Some(error) = self.failures.lock().unwrap().get(record_id).cloned() {
                return Err(error);
            }
            self.uploaded
                .lock()
                .unwrap()
                .push((collection.to_string(), record_id.to_string(), payload.clone()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> FirestoreRemoteStore {
        let config = RemoteConfig {
            project_id: "survey-app".to_string(),
            api_key: Some("k3y".to_string()),
            ..RemoteConfig::default()
        };
        FirestoreRemoteStore::new(&config).unwrap()
    }

    #[test]
    fn test_encode_nested_values() {
        let encoded = encode_value(&json!({
            "id": "abc",
            "povertyScore": 9,
            "geoCoordinates": {"latitude": -0.42, "longitude": 36.95},
            "photo": null,
            "tags": ["a", true]
        }));
        let fields = &encoded["mapValue"]["fields"];
        assert_eq!(fields["id"], json!({"stringValue": "abc"}));
        assert_eq!(fields["povertyScore"], json!({"integerValue": "9"}));
        assert_eq!(
            fields["geoCoordinates"]["mapValue"]["fields"]["latitude"],
            json!({"doubleValue": -0.42})
        );
        assert_eq!(fields["photo"], json!({"nullValue": null}));
        assert_eq!(
            fields["tags"],
            json!({"arrayValue": {"values": [{"stringValue": "a"}, {"booleanValue": true}]}})
        );
    }

    #[test]
    fn test_commit_body_names_document_and_requests_server_timestamps() {
        let body = store().commit_body("households", "rec-1", &json!({"id": "rec-1"}));
        let write = &body["writes"][0];
        assert_eq!(
            write["update"]["name"],
            "projects/survey-app/databases/(default)/documents/households/rec-1"
        );
        assert_eq!(write["updateTransforms"][0]["fieldPath"], "createdAt");
        assert_eq!(write["updateTransforms"][1]["setToServerValue"], "REQUEST_TIME");
    }

    #[test]
    fn test_document_name_keeps_id_verbatim() {
        let body = store().commit_body("households", "rec 1:ä", &json!({}));
        assert_eq!(
            body["writes"][0]["update"]["name"],
            "projects/survey-app/databases/(default)/documents/households/rec 1:ä"
        );
    }

    #[tokio::test]
    async fn test_ids_with_slash_are_rejected_before_upload() {
        let result = store().add_record("households", "a/b", &json!({"id": "a/b"})).await;
        assert!(matches!(result, Err(RemoteStoreError::Other(msg)) if msg.contains("a/b")));
        let result = store().add_record("households", "", &json!({})).await;
        assert!(matches!(result, Err(RemoteStoreError::Other(_))));
    }

    #[test]
    fn test_commit_url_carries_api_key() {
        assert_eq!(
            store().commit_url(),
            "https://firestore.googleapis.com/v1/projects/survey-app/databases/(default)/documents:commit?key=k3y"
        );
    }

    #[test]
    fn test_failure_classification() {
        let denied = r#"{"error": {"code": 403, "status": "PERMISSION_DENIED"}}"#;
        assert_eq!(classify_failure(StatusCode::FORBIDDEN, denied), RemoteStoreError::PermissionDenied);
        assert_eq!(classify_failure(StatusCode::UNAUTHORIZED, ""), RemoteStoreError::PermissionDenied);

        let unavailable = r#"{"error": {"status": "UNAVAILABLE"}}"#;
        assert!(matches!(
            classify_failure(StatusCode::INTERNAL_SERVER_ERROR, unavailable),
            RemoteStoreError::Unavailable(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::SERVICE_UNAVAILABLE, "down"),
            RemoteStoreError::Unavailable(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, "bad"),
            RemoteStoreError::Other(_)
        ));
    }
}
