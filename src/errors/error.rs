use std::fmt;
use serde::Serialize;
use thiserror::Error;

/// Failures of the local SQLite store.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Local store error: {0}")]
    Other(String),
}

impl DbError {
    fn kind(&self) -> &'static str {
        match self {
            DbError::Sqlx(_) => "Sqlx",
            DbError::Migration(_) => "Migration",
            DbError::Other(_) => "Other",
        }
    }
}

impl serde::Serialize for DbError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("DbError", 2)?;
        state.serialize_field("type", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// `sqlx::Error` is not Clone; a cloned query failure keeps only its text.
impl Clone for DbError {
    fn clone(&self) -> Self {
        match self {
            DbError::Sqlx(err) => DbError::Other(err.to_string()),
            DbError::Migration(s) => DbError::Migration(s.clone()),
            DbError::Other(s) => DbError::Other(s.clone()),
        }
    }
}

/// Errors raised by the household queue and its callers.
#[derive(Debug, Error, Clone, Serialize)]
pub enum DomainError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error("Entity not found: {0} with ID {1}")]
    EntityNotFound(String, String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The stored collection could not be read or parsed.
    #[error("Failed to load household data: {0}")]
    Load(String),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Household data could not be encoded: {0}")]
    Internal(String),
}

/// Errors at the service boundary.
#[derive(Debug, Error, Clone, Serialize)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

#[derive(Debug, Error, Clone, Serialize)]
pub enum SyncError {
    #[error("A sync is already in progress")]
    Busy,

    #[error("Local data could not be loaded: {0}")]
    Snapshot(String),
}

/// Rejections of household input. No write happens when one is returned.
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Missing required fields: {}", .fields.join(", "))]
    MissingFields { fields: Vec<String> },

    #[error("Field '{field}' must be between {min} and {max}")]
    Range { field: String, min: String, max: String },

    #[error("Field '{field}' is malformed: {reason}")]
    Format { field: String, reason: String },

    #[error("Field '{field}' has an unsupported value: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        Self::Required { field: field.to_string() }
    }

    pub fn missing_fields(fields: Vec<String>) -> Self {
        Self::MissingFields { fields }
    }

    pub fn range<T: fmt::Display>(field: &str, min: T, max: T) -> Self {
        Self::Range {
            field: field.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    pub fn format(field: &str, reason: &str) -> Self {
        Self::Format { field: field.to_string(), reason: reason.to_string() }
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::InvalidValue { field: field.to_string(), reason: reason.to_string() }
    }

    /// Name of the offending field, if the error concerns exactly one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Required { field }
            | Self::Range { field, .. }
            | Self::Format { field, .. }
            | Self::InvalidValue { field, .. } => Some(field),
            Self::MissingFields { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloned_query_failure_keeps_message() {
        let err = DbError::Sqlx(sqlx::Error::RowNotFound);
        let cloned = err.clone();
        assert!(matches!(cloned, DbError::Other(_)));
        assert_eq!(cloned.to_string(), format!("Local store error: {}", sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_wrapped_errors_display_their_source() {
        let err = DomainError::from(ValidationError::missing_fields(vec!["photo".to_string()]));
        assert_eq!(err.to_string(), "Missing required fields: photo");
        let err = ServiceError::from(DomainError::from(SyncError::Busy));
        assert_eq!(err.to_string(), "A sync is already in progress");
    }
}
