use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Runtime;

use crate::ffi::error::{clear_last_error, set_last_error, ErrorCode, FFIError};

pub mod core;
pub mod error;
pub mod household;
pub mod sync;

/// Shared runtime for every blocking FFI call.
static RUNTIME: Lazy<Result<Runtime, String>> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("household-core")
        .build()
        .map_err(|e| e.to_string())
});

/// Run a future to completion on the shared runtime.
pub fn block_on_async<F, T>(future: F) -> FFIResult<T>
where
    F: std::future::Future<Output = FFIResult<T>>,
{
    match RUNTIME.as_ref() {
        Ok(rt) => rt.block_on(future),
        Err(e) => Err(FFIError::internal(format!("Failed to start async runtime: {}", e))),
    }
}

/// Error handling helper for FFI boundaries (returns error code)
pub fn handle_status_result<F>(func: F) -> c_int
where
    F: FnOnce() -> FFIResult<()>,
{
    match func() {
        Ok(_) => {
            clear_last_error();
            ErrorCode::Success as c_int
        }
        Err(e) => {
            log::error!(
                "FFI call failed. Code: {:?}, Message: {}, Details: {}",
                e.code,
                e.message,
                e.details.as_deref().unwrap_or("None")
            );
            set_last_error(&e);
            e.code as c_int
        }
    }
}

macro_rules! ensure_ptr {
    ($p:expr) => {
        if $p.is_null() {
            return Err($crate::ffi::error::FFIError::new(
                $crate::ffi::error::ErrorCode::NullPointer,
                "null ptr",
            ));
        }
    };
}
pub(crate) use ensure_ptr;

/// Borrow a C string as UTF-8.
///
/// # Safety
/// `ptr` must be non-null and point to a NUL-terminated string that outlives the call.
pub unsafe fn read_c_str<'a>(ptr: *const c_char) -> FFIResult<&'a str> {
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| FFIError::new(ErrorCode::InvalidUtf8, "utf8"))
}

/// Parse a JSON payload passed as a C string.
///
/// # Safety
/// Same requirements as [`read_c_str`].
pub unsafe fn parse_payload<T: DeserializeOwned>(ptr: *const c_char) -> FFIResult<T> {
    let s = read_c_str(ptr)?;
    serde_json::from_str(s).map_err(|e| FFIError::invalid_argument(&format!("json {e}")))
}

/// Serialize `value` and hand ownership of the resulting C string to the caller.
///
/// # Safety
/// `result` must be a valid, non-null pointer to writable storage.
pub unsafe fn write_json<T: Serialize>(result: *mut *mut c_char, value: &T) -> FFIResult<()> {
    let json = serde_json::to_string(value)
        .map_err(|e| FFIError::internal(format!("Failed to serialize result: {}", e)))?;
    let c_string = CString::new(json)
        .map_err(|e| FFIError::internal(format!("CString creation failed: {}", e)))?;
    *result = c_string.into_raw();
    Ok(())
}

// Re-export FFIResult for convenience within the ffi module
pub use error::FFIResult;
