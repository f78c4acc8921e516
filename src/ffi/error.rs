use std::cell::RefCell;
use std::ffi::{c_char, CString};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::{DbError, DomainError, ServiceError, SyncError, ValidationError};

/// Numeric codes returned across the C ABI. Ranges: 1xx store, 2xx household, 3xx setup, 4xx sync.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Success = 0,

    InvalidArgument = 2,
    NullPointer = 3,
    InvalidUtf8 = 4,
    InternalError = 6,
    NotInitialized = 7,

    DatabaseGeneral = 100,
    DatabaseMigration = 106,

    EntityNotFound = 201,
    ValidationFailed = 204,
    LoadFailed = 209,

    ConfigurationError = 310,

    SyncSnapshotFailed = 409,
    SyncBusy = 413,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, *self as i32)
    }
}

/// Error type for FFI boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FFIError {
    /// Error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (JSON string)
    pub details: Option<String>,
}

impl fmt::Display for FFIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(details) = &self.details {
            write!(f, "{}: {} ({})", self.code, self.message, details)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for FFIError {}

impl FFIError {
    pub fn new(code: ErrorCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: &str, details: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: Some(details.to_string()),
        }
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn internal(message: String) -> Self {
        Self::new(ErrorCode::InternalError, &message)
    }

    pub fn not_initialized() -> Self {
        Self::new(ErrorCode::NotInitialized, "Library not initialized; call initialize_library first")
    }

    pub fn from_service_error(err: ServiceError) -> Self {
        err.into()
    }
}

impl From<DbError> for FFIError {
    fn from(err: DbError) -> Self {
        let code = match err {
            DbError::Migration(_) => ErrorCode::DatabaseMigration,
            DbError::Sqlx(_) | DbError::Other(_) => ErrorCode::DatabaseGeneral,
        };
        Self::new(code, &err.to_string())
    }
}

impl From<DomainError> for FFIError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Database(db_err) => db_err.into(),
            DomainError::EntityNotFound(entity, id) => Self::with_details(
                ErrorCode::EntityNotFound,
                &format!("{} {} does not exist", entity, id),
                &json!({ "entity": entity, "id": id }).to_string(),
            ),
            DomainError::Validation(val_err) => val_err.into(),
            DomainError::Load(_) => Self::new(ErrorCode::LoadFailed, &err.to_string()),
            DomainError::Sync(sync_err) => sync_err.into(),
            DomainError::Internal(_) => Self::new(ErrorCode::InternalError, &err.to_string()),
        }
    }
}

impl From<ServiceError> for FFIError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(domain_err) => domain_err.into(),
            ServiceError::Configuration(_) => Self::new(ErrorCode::ConfigurationError, &err.to_string()),
        }
    }
}

impl From<SyncError> for FFIError {
    fn from(err: SyncError) -> Self {
        let code = match err {
            SyncError::Busy => ErrorCode::SyncBusy,
            SyncError::Snapshot(_) => ErrorCode::SyncSnapshotFailed,
        };
        Self::new(code, &err.to_string())
    }
}

impl From<ValidationError> for FFIError {
    fn from(err: ValidationError) -> Self {
        let message = err.to_string();
        let details = match &err {
            ValidationError::Required { field } => json!({ "type": "required", "field": field }),
            ValidationError::MissingFields { fields } => json!({ "type": "missing_fields", "fields": fields }),
            ValidationError::Range { field, min, max } => {
                json!({ "type": "range", "field": field, "min": min, "max": max })
            }
            ValidationError::Format { field, reason } => {
                json!({ "type": "format", "field": field, "reason": reason })
            }
            ValidationError::InvalidValue { field, reason } => {
                json!({ "type": "invalid_value", "field": field, "reason": reason })
            }
        };
        Self::with_details(ErrorCode::ValidationFailed, &message, &details.to_string())
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<FFIError>> = const { RefCell::new(None) };
}

pub fn set_last_error(error: &FFIError) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(error.clone()));
}

pub fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

pub fn last_error() -> Option<FFIError> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// The calling thread's last error as a JSON C string, or null if the last call succeeded.
pub fn get_last_error_message() -> *mut c_char {
    let Some(error) = last_error() else {
        return std::ptr::null_mut();
    };
    let json = serde_json::to_string(&error).unwrap_or_else(|_| error.message.clone());
    CString::new(json).map_or(std::ptr::null_mut(), CString::into_raw)
}

// Result type alias for FFI functions
pub type FFIResult<T> = Result<T, FFIError>;
