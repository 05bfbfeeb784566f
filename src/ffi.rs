//! FFI bindings for Synheart Circadian
//!
//! This module provides C-compatible functions for calling the engine from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `circadian_free_string`.
//!
//! Times passed as `now_local` are local wall-clock date-times such as
//! `2024-03-24T11:00:00`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::NaiveDateTime;

use crate::config::ModelConfig;
use crate::pipeline::{sleep_report_from_json, CircadianProcessor};
use crate::schema::{parse_local_datetime, ValidationPolicy};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Caller must free with `circadian_free_string`
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Read `records_json` and `now_local`, recording an error on failure
unsafe fn read_inputs(
    records_json: *const c_char,
    now_local: *const c_char,
) -> Option<(String, NaiveDateTime)> {
    let Some(json) = cstr_to_string(records_json) else {
        set_last_error("Invalid records JSON string pointer");
        return None;
    };
    let Some(now_str) = cstr_to_string(now_local) else {
        set_last_error("Invalid time string pointer");
        return None;
    };
    match parse_local_datetime(&now_str) {
        Some(now) => Some((json, now)),
        None => {
            set_last_error(&format!("Invalid local date-time: {}", now_str));
            None
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Compute a sleep report from a JSON array of raw sleep records.
///
/// Invalid records are dropped and listed under `rejected` in the output.
///
/// # Safety
/// - `records_json` and `now_local` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `circadian_free_string`.
/// - Returns NULL on error; call `circadian_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn circadian_report(
    records_json: *const c_char,
    now_local: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some((json, now)) = read_inputs(records_json, now_local) else {
        return ptr::null_mut();
    };

    match sleep_report_from_json(&json, now, ValidationPolicy::Lenient) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a CircadianProcessor
pub struct CircadianProcessorHandle {
    processor: CircadianProcessor,
}

/// Create a new processor with the default model configuration.
///
/// # Safety
/// - Returns a pointer that must be freed with `circadian_processor_free`.
#[no_mangle]
pub unsafe extern "C" fn circadian_processor_new() -> *mut CircadianProcessorHandle {
    clear_last_error();
    Box::into_raw(Box::new(CircadianProcessorHandle {
        processor: CircadianProcessor::new(),
    }))
}

/// Create a processor from a JSON model configuration.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string.
/// - Returns a pointer that must be freed with `circadian_processor_free`.
/// - Returns NULL if the configuration does not parse or validate.
#[no_mangle]
pub unsafe extern "C" fn circadian_processor_with_config(
    config_json: *const c_char,
) -> *mut CircadianProcessorHandle {
    clear_last_error();

    let Some(json) = cstr_to_string(config_json) else {
        set_last_error("Invalid config JSON string pointer");
        return ptr::null_mut();
    };

    match ModelConfig::from_json(&json).and_then(CircadianProcessor::with_config) {
        Ok(processor) => Box::into_raw(Box::new(CircadianProcessorHandle { processor })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by a `circadian_processor_*`
///   constructor, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn circadian_processor_free(processor: *mut CircadianProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Compute an enveloped sleep report for one user, reusing the cached profile
/// when the history window is unchanged.
///
/// # Safety
/// - `processor` must be a valid pointer returned by a `circadian_processor_*`
///   constructor.
/// - `user_id`, `records_json` and `now_local` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `circadian_free_string`.
/// - Returns NULL on error; call `circadian_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn circadian_processor_report(
    processor: *mut CircadianProcessorHandle,
    user_id: *const c_char,
    records_json: *const c_char,
    now_local: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let Some(user) = cstr_to_string(user_id) else {
        set_last_error("Invalid user id string pointer");
        return ptr::null_mut();
    };
    let Some((json, now)) = read_inputs(records_json, now_local) else {
        return ptr::null_mut();
    };

    match handle
        .processor
        .report_json(&user, &json, now, ValidationPolicy::Lenient)
    {
        Ok(envelope) => string_to_cstr(&envelope),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Save the processor's profile cache to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by a `circadian_processor_*`
///   constructor.
/// - Returns a newly allocated string that must be freed with `circadian_free_string`.
/// - Returns NULL on error; call `circadian_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn circadian_processor_save_cache(
    processor: *mut CircadianProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.save_cache() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Replace the processor's profile cache from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by a `circadian_processor_*`
///   constructor.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `circadian_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn circadian_processor_load_cache(
    processor: *mut CircadianProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let Some(json_str) = cstr_to_string(json) else {
        set_last_error("Invalid JSON string pointer");
        return -1;
    };

    match handle.processor.load_cache(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a `circadian_*` function.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a `circadian_*` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn circadian_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next `circadian_*` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn circadian_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn circadian_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::fixtures::office_worker;
    use crate::schema::RawSleepRecord;

    fn office_worker_json() -> CString {
        let raw: Vec<RawSleepRecord> = office_worker(3)
            .iter()
            .map(|r| {
                let mut raw = RawSleepRecord::new(r.date.to_string(), r.total_sleep_time);
                raw.bedtime = r.bedtime.map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string());
                raw.wake_time = r.wake_time.map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string());
                raw
            })
            .collect();
        CString::new(serde_json::to_string(&raw).unwrap()).unwrap()
    }

    fn now() -> CString {
        CString::new("2024-03-24T11:00:00").unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        circadian_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_report() {
        unsafe {
            let json = office_worker_json();
            let now = now();

            let result = take_string(circadian_report(json.as_ptr(), now.as_ptr()));
            let parsed: serde_json::Value = serde_json::from_str(&result).unwrap();
            assert_eq!(parsed["report"]["debt"]["debt_category"], "moderate");
            assert!(circadian_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        unsafe {
            let processor = circadian_processor_new();
            assert!(!processor.is_null());

            let user = CString::new("alice").unwrap();
            let json = office_worker_json();
            let now = now();

            let envelope = take_string(circadian_processor_report(
                processor,
                user.as_ptr(),
                json.as_ptr(),
                now.as_ptr(),
            ));
            let parsed: serde_json::Value = serde_json::from_str(&envelope).unwrap();
            assert!(parsed["producer"]["instance_id"].as_str().is_some());

            // Cache round-trips into a fresh processor
            let cache = circadian_processor_save_cache(processor);
            assert!(!cache.is_null());

            let processor2 = circadian_processor_new();
            assert_eq!(circadian_processor_load_cache(processor2, cache), 0);

            circadian_free_string(cache);
            circadian_processor_free(processor);
            circadian_processor_free(processor2);
        }
    }

    #[test]
    fn test_ffi_processor_with_config() {
        unsafe {
            let good = CString::new(r#"{"debt": {"decay_tau_days": 2.0}}"#).unwrap();
            let processor = circadian_processor_with_config(good.as_ptr());
            assert!(!processor.is_null());
            circadian_processor_free(processor);

            let bad = CString::new("not json").unwrap();
            assert!(circadian_processor_with_config(bad.as_ptr()).is_null());
            assert!(!circadian_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let now = now();

            let result = circadian_report(invalid_json.as_ptr(), now.as_ptr());
            assert!(result.is_null());

            let error = circadian_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            let json = office_worker_json();
            let bad_time = CString::new("tomorrow").unwrap();
            assert!(circadian_report(json.as_ptr(), bad_time.as_ptr()).is_null());
            let error_str = CStr::from_ptr(circadian_last_error()).to_str().unwrap();
            assert!(error_str.contains("tomorrow"));

            assert!(circadian_processor_save_cache(ptr::null_mut()).is_null());
            assert_eq!(
                circadian_processor_load_cache(ptr::null_mut(), json.as_ptr()),
                -1
            );
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = circadian_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }
}
