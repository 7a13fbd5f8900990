//! FFI bindings for the ecosystem health engine
//!
//! This module provides C-compatible functions for calling the engine from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `ehs_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::error::ComputeError;
use crate::pipeline::HealthEngine;

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

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Build an engine from an optional config string; NULL means defaults
unsafe fn engine_from_config(config_json: *const c_char) -> Result<HealthEngine, ComputeError> {
    if config_json.is_null() {
        return Ok(HealthEngine::new());
    }
    match cstr_to_string(config_json) {
        Some(json) => HealthEngine::from_config_json(&json),
        None => Err(ComputeError::InvalidConfig(
            "config is not valid UTF-8".to_string(),
        )),
    }
}

fn finish(result: Result<String, ComputeError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Compute the region table from a JSON array of raw records.
///
/// # Safety
/// - `input_json` must be a valid null-terminated C string.
/// - `config_json` must be a valid null-terminated C string or NULL for defaults.
/// - Returns a newly allocated string that must be freed with `ehs_free_string`.
/// - Returns NULL on error; call `ehs_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ehs_compute_json(
    input_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let input = match cstr_to_string(input_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid input string pointer");
            return ptr::null_mut();
        }
    };

    finish(engine_from_config(config_json).and_then(|engine| engine.compute_json(&input)))
}

// ============================================================================
// Stateful Engine API
// ============================================================================

/// Opaque handle to a HealthEngine
pub struct HealthEngineHandle {
    engine: HealthEngine,
}

/// Create an engine from a JSON configuration (NULL for defaults).
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string or NULL.
/// - Must be freed with `ehs_engine_free`.
/// - Returns NULL on error; call `ehs_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ehs_engine_new(config_json: *const c_char) -> *mut HealthEngineHandle {
    clear_last_error();

    match engine_from_config(config_json) {
        Ok(engine) => Box::into_raw(Box::new(HealthEngineHandle { engine })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `ehs_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn ehs_engine_free(engine: *mut HealthEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Compute with an existing engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `ehs_engine_new`.
/// - `input_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `ehs_free_string`.
/// - Returns NULL on error; call `ehs_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn ehs_engine_compute(
    engine: *const HealthEngineHandle,
    input_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &*engine;

    let input = match cstr_to_string(input_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid input string pointer");
            return ptr::null_mut();
        }
    };

    finish(handle.engine.compute_json(&input))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by engine functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an `ehs_*` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn ehs_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next `ehs_*` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn ehs_last_error() -> *const c_char {
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
pub unsafe extern "C" fn ehs_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
