// src/ffi/core.rs
// ============================================================================
// Core FFI functions for library initialization and management
// ============================================================================

use crate::config::CoreConfig;
use crate::ffi::error::FFIError;
use crate::ffi::{block_on_async, ensure_ptr, handle_status_result, read_c_str};
use std::ffi::{c_char, CString};
use std::os::raw::c_int;

/// Initialize the library from a JSON `CoreConfig`.
/// Returns 0 on success, non-zero on error
#[unsafe(no_mangle)]
pub unsafe extern "C" fn initialize_library(config_json: *const c_char) -> c_int {
    let result = std::panic::catch_unwind(|| unsafe {
        ensure_ptr!(config_json);
        let raw = read_c_str(config_json)?;
        let config = CoreConfig::from_json(raw).map_err(FFIError::from_service_error)?;
        block_on_async(crate::globals::initialize(config))
    });

    match result {
        Ok(ffi_result) => handle_status_result(|| ffi_result),
        Err(panic_payload) => {
            let panic_msg = if let Some(s) = panic_payload.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic_payload.downcast_ref::<&str>() {
                s.to_string()
            } else {
                "Panicked during FFI call, but panic message is not a string".to_string()
            };
            log::error!("Panic in initialize_library: {}", panic_msg);
            handle_status_result(|| Err(FFIError::internal(format!("Panic during initialization: {}", panic_msg))))
        }
    }
}

/// Frees a C string that was allocated by Rust and passed over FFI.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        // Takes ownership back and drops it.
        let _ = CString::from_raw(ptr);
    }
}

/// Get library version
/// Returns allocated string that must be freed with free_string()
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_library_version() -> *mut c_char {
    CString::new(env!("CARGO_PKG_VERSION")).map_or(std::ptr::null_mut(), CString::into_raw)
}

/// Get the last error of the calling thread as JSON (`{code, message, details}`)
/// Returns allocated string that must be freed with free_string(), or null if no error
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_last_error() -> *mut c_char {
    crate::ffi::error::get_last_error_message()
}
