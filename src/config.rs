use serde::{Deserialize, Serialize};
use std::env;

use crate::errors::{ServiceError, ServiceResult};

pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_COLLECTION: &str = "households";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_PARALLEL_UPLOADS: usize = 3;

/// Remote document store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub project_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            api_key: None,
            base_url: default_base_url(),
            collection: default_collection(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_parallel_uploads")]
    pub max_parallel_uploads: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { max_parallel_uploads: DEFAULT_MAX_PARALLEL_UPLOADS }
    }
}

/// Everything the core needs at start-up. Delivered as JSON by the host app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    pub database_url: String,
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_base_url() -> String {
    DEFAULT_FIRESTORE_BASE_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_parallel_uploads() -> usize {
    DEFAULT_MAX_PARALLEL_UPLOADS
}

impl CoreConfig {
    pub fn from_json(json: &str) -> ServiceResult<Self> {
        let config: CoreConfig = serde_json::from_str(json)
            .map_err(|e| ServiceError::Configuration(format!("invalid config json: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from `HSC_*` variables, loading a `.env` file first if one exists.
    pub fn from_env() -> ServiceResult<Self> {
        let _ = dotenv::dotenv();

        let database_url = required_var("HSC_DATABASE_URL")?;
        let project_id = env::var("HSC_REMOTE_PROJECT_ID").unwrap_or_default();

        let config = CoreConfig {
            database_url,
            remote: RemoteConfig {
                project_id,
                api_key: env::var("HSC_REMOTE_API_KEY").ok().filter(|k| !k.is_empty()),
                base_url: env::var("HSC_REMOTE_BASE_URL").unwrap_or_else(|_| default_base_url()),
                collection: env::var("HSC_REMOTE_COLLECTION").unwrap_or_else(|_| default_collection()),
                request_timeout_secs: parsed_var("HSC_REMOTE_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            },
            sync: SyncConfig {
                max_parallel_uploads: parsed_var("HSC_MAX_PARALLEL_UPLOADS", DEFAULT_MAX_PARALLEL_UPLOADS)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if !self.database_url.starts_with("sqlite:") {
            return Err(ServiceError::Configuration(
                "database_url must be a SQLite URL starting with 'sqlite:'".to_string(),
            ));
        }
        if self.remote.collection.trim().is_empty() {
            return Err(ServiceError::Configuration("remote.collection must not be empty".to_string()));
        }
        if self.sync.max_parallel_uploads == 0 {
            return Err(ServiceError::Configuration("sync.max_parallel_uploads must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn required_var(name: &str) -> ServiceResult<String> {
    env::var(name).map_err(|_| ServiceError::Configuration(format!("{} is not set", name)))
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> ServiceResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ServiceError::Configuration(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_fills_defaults() {
        let config = CoreConfig::from_json(
            r#"{"database_url":"sqlite://survey.sqlite?mode=rwc","remote":{"project_id":"field-demo"}}"#,
        )
        .unwrap();
        assert_eq!(config.remote.collection, "households");
        assert_eq!(config.remote.base_url, DEFAULT_FIRESTORE_BASE_URL);
        assert_eq!(config.remote.request_timeout_secs, 30);
        assert_eq!(config.sync.max_parallel_uploads, 3);
        assert!(config.remote.api_key.is_none());
    }

    #[test]
    fn test_rejects_non_sqlite_url() {
        let err = CoreConfig::from_json(
            r#"{"database_url":"/tmp/survey.sqlite","remote":{"project_id":"p"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }

    #[test]
    fn test_rejects_zero_parallelism() {
        let err = CoreConfig::from_json(
            r#"{"database_url":"sqlite::memory:","remote":{"project_id":"p"},"sync":{"max_parallel_uploads":0}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }
}
