// src/ffi/household.rs
// =========================================================================
// HOUSEHOLD DOMAIN – FFI BINDINGS
// =========================================================================
use crate::domains::household::types::NewHousehold;
use crate::ffi::error::FFIError;
use crate::ffi::{block_on_async, ensure_ptr, handle_status_result, parse_payload, write_json};
use crate::globals;
use crate::types::PaginationParams;

use serde::Deserialize;
use std::os::raw::{c_char, c_int};

#[derive(Deserialize)]
struct IdPayload {
    id: String,
}

/// Payload: `NewHousehold` JSON. Result: the saved household with its vulnerability tier.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn household_create(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(payload_json);
        ensure_ptr!(result);
        let draft: NewHousehold = parse_payload(payload_json)?;
        let svc = globals::get_household_service()?;
        let resp = block_on_async(async { svc.create_household(draft).await.map_err(FFIError::from_service_error) })?;
        write_json(result, &resp)
    })
}

/// Payload { "id": "...", "household": NewHousehold }
#[unsafe(no_mangle)]
pub unsafe extern "C" fn household_update(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(payload_json);
        ensure_ptr!(result);
        #[derive(Deserialize)]
        struct P {
            id: String,
            household: NewHousehold,
        }
        let p: P = parse_payload(payload_json)?;
        let svc = globals::get_household_service()?;
        let resp = block_on_async(async {
            svc.update_household(&p.id, p.household).await.map_err(FFIError::from_service_error)
        })?;
        write_json(result, &resp)
    })
}

/// Payload { "id": "..." }. Unknown ids succeed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn household_delete(payload_json: *const c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(payload_json);
        let p: IdPayload = parse_payload(payload_json)?;
        let svc = globals::get_household_service()?;
        block_on_async(async { svc.delete_household(&p.id).await.map_err(FFIError::from_service_error) })
    })
}

/// Payload { "id": "..." }
#[unsafe(no_mangle)]
pub unsafe extern "C" fn household_get(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(payload_json);
        ensure_ptr!(result);
        let p: IdPayload = parse_payload(payload_json)?;
        let svc = globals::get_household_service()?;
        let resp = block_on_async(async { svc.get_household(&p.id).await.map_err(FFIError::from_service_error) })?;
        write_json(result, &resp)
    })
}

/// Result { "records": [...], "loadError": string | null }
#[unsafe(no_mangle)]
pub unsafe extern "C" fn household_list(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let svc = globals::get_household_service()?;
        let list = block_on_async(async { svc.list_households().await.map_err(FFIError::from_service_error) })?;
        write_json(result, &list)
    })
}

/// Payload { "page": u32 }. Pages hold ten households.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn household_list_page(payload_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(payload_json);
        ensure_ptr!(result);
        #[derive(Deserialize)]
        struct P {
            page: Option<u32>,
        }
        let p: P = parse_payload(payload_json)?;
        let params = PaginationParams::page(p.page.unwrap_or(1));
        let svc = globals::get_household_service()?;
        let page = block_on_async(async {
            svc.list_households_page(params).await.map_err(FFIError::from_service_error)
        })?;
        write_json(result, &page)
    })
}

/// Writes the number of visible households to `count`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn household_count(count: *mut i64) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(count);
        let svc = globals::get_household_service()?;
        let n = block_on_async(async { svc.count_households().await.map_err(FFIError::from_service_error) })?;
        *count = n as i64;
        Ok(())
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn home_summary(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let svc = globals::get_household_service()?;
        let summary = block_on_async(async { svc.home_summary().await.map_err(FFIError::from_service_error) })?;
        write_json(result, &summary)
    })
}

/// Sub-locations, villages, genders and assessment questions for the form screens.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn survey_catalog(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        ensure_ptr!(result);
        let svc = globals::get_household_service()?;
        write_json(result, &svc.catalog())
    })
}
