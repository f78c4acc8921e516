// src/ffi/sync.rs
// =========================================================================
// SYNC – FFI BINDINGS
// =========================================================================
use crate::ffi::error::FFIError;
use crate::ffi::{block_on_async, ensure_ptr, handle_status_result, write_json};
use crate::globals;

use std::os::raw::{c_char, c_int};

/// Upload all queued households. Blocks until the batch finishes.
/// Result: `SyncReport` JSON. Returns `SyncBusy` if a batch is already running.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sync_run(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let svc = globals::get_sync_service()?;
        let report = block_on_async(async { svc.sync_now().await.map_err(FFIError::from_service_error) })?;
        write_json(result, &report)
    })
}

/// Result { "message": string | null, "category": "success" | "failure" | null }
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sync_status(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let svc = globals::get_sync_service()?;
        let status = block_on_async(async { Ok(svc.status().await) })?;
        write_json(result, &status)
    })
}

/// Result { "state": "Idle" | "Syncing", "progress": {completed, total}, "lastReport": ... }
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sync_state(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let svc = globals::get_sync_service()?;
        let state = block_on_async(async { Ok(svc.state().await) })?;
        write_json(result, &state)
    })
}
