//! # fortdocs-integrity-ffi
//!
//! C-compatible startup hook for the FortDocs device-integrity gate.
//!
//! The host app calls this once before unlocking the document store and
//! again whenever it wants a fresh answer.
//!
//! ## Usage
//!
//! ```c
//! #include "fortdocs_integrity.h"
//!
//! int unlock_allowed(const char* policy_json, size_t policy_len) {
//!     // Empty policy = embedded defaults
//!     FortdocsIntegrityHandle* handle =
//!         fortdocs_integrity_init((const uint8_t*)policy_json, policy_len);
//!     if (!handle) {
//!         return 0;  // bad policy: stay locked
//!     }
//!
//!     int32_t action = 2;
//!     int32_t rc = fortdocs_integrity_evaluate(handle, &action);
//!
//!     uint8_t* verdict = NULL;
//!     size_t verdict_len = 0;
//!     if (fortdocs_integrity_last_verdict(handle, &verdict, &verdict_len) == 0) {
//!         // JSON verdict for the audit log
//!         fortdocs_integrity_free(verdict);
//!     }
//!
//!     fortdocs_integrity_destroy(handle);
//!     return rc == 0 && action != 2;  // 2 = Deny
//! }
//! ```

#![allow(clippy::missing_safety_doc)] // FFI functions are inherently unsafe

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use fortdocs_integrity::{IntegrityConfig, IntegrityError, IntegrityGate};

/// Opaque handle to a configured integrity gate.
pub struct FortdocsIntegrityHandle {
    gate: IntegrityGate,
}

/// Status codes returned by FFI functions.
#[repr(C)]
pub enum FortdocsIntegrityStatus {
    /// Success.
    Success = 0,
    /// Invalid argument.
    InvalidArgument = -1,
    /// Initialization failed.
    InitializationFailed = -2,
    /// The evaluation could not run.
    EvaluationFailed = -3,
    /// Serialization error.
    SerializationError = -4,
    /// No evaluation has completed yet.
    NoVerdict = -5,
    /// Internal error.
    InternalError = -99,
}

fn config_from_bytes(bytes: &[u8]) -> Result<IntegrityConfig, IntegrityError> {
    if bytes.is_empty() {
        return Ok(IntegrityConfig::default());
    }
    let text = std::str::from_utf8(bytes).map_err(|e| IntegrityError::ConfigError {
        message: format!("policy is not valid UTF-8: {e}"),
    })?;
    IntegrityConfig::from_json_str(text)
}

/// Validate a policy and create a gate.
///
/// `config_json` holds a JSON policy of `config_len` bytes. A zero length
/// selects the embedded default policy and `config_json` may then be NULL.
///
/// Returns NULL if the policy is rejected; no probe has run in that case.
///
/// # Safety
///
/// `config_json` must point to `config_len` readable bytes (or be NULL when
/// `config_len` is 0). The returned handle must be freed with
/// `fortdocs_integrity_destroy`.
#[no_mangle]
pub unsafe extern "C" fn fortdocs_integrity_init(
    config_json: *const u8,
    config_len: usize,
) -> *mut FortdocsIntegrityHandle {
    let bytes: &[u8] = if config_len == 0 {
        &[]
    } else if config_json.is_null() {
        tracing::error!("Policy pointer is NULL with non-zero length");
        return ptr::null_mut();
    } else {
        std::slice::from_raw_parts(config_json, config_len)
    };

    guarded_init(|| config_from_bytes(bytes).and_then(IntegrityGate::from_config))
}

fn guarded_init<F>(build: F) -> *mut FortdocsIntegrityHandle
where
    F: FnOnce() -> Result<IntegrityGate, IntegrityError> + panic::UnwindSafe,
{
    match panic::catch_unwind(build) {
        Ok(Ok(gate)) => Box::into_raw(Box::new(FortdocsIntegrityHandle { gate })),
        Ok(Err(e)) => {
            tracing::error!("Failed to initialize integrity gate: {}", e);
            ptr::null_mut()
        },
        Err(_) => {
            tracing::error!("Integrity gate initialization panicked");
            ptr::null_mut()
        },
    }
}

/// Run one evaluation.
///
/// On success writes the action code to `action`: 0 = Allow,
/// 1 = AllowDegraded, 2 = Deny. On `Deny` the host must not decrypt.
/// On any failure `action` is set to 2 as well.
///
/// # Returns
///
/// 0 on success, negative status code on failure.
///
/// # Safety
///
/// - `handle` must be a valid handle from `fortdocs_integrity_init`
/// - `action` must be a valid pointer
/// - must not be called from a thread that is driving a tokio runtime
#[no_mangle]
pub unsafe extern "C" fn fortdocs_integrity_evaluate(
    handle: *mut FortdocsIntegrityHandle,
    action: *mut i32,
) -> i32 {
    if handle.is_null() || action.is_null() {
        return FortdocsIntegrityStatus::InvalidArgument as i32;
    }
    let handle = &*handle;
    *action = fortdocs_integrity::GateAction::Deny.code();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handle.gate.evaluate()));
    match outcome {
        Ok(Ok(verdict)) => {
            *action = handle.gate.decide(&verdict).code();
            FortdocsIntegrityStatus::Success as i32
        },
        Ok(Err(e)) => {
            tracing::error!("Integrity evaluation failed: {}", e);
            FortdocsIntegrityStatus::EvaluationFailed as i32
        },
        Err(_) => {
            tracing::error!("Integrity evaluation panicked");
            FortdocsIntegrityStatus::InternalError as i32
        },
    }
}

/// Fetch the most recent verdict as JSON.
///
/// # Arguments
///
/// * `handle` - Handle from `fortdocs_integrity_init`
/// * `verdict_data` - Output pointer for the JSON bytes (caller must free with `fortdocs_integrity_free`)
/// * `verdict_len` - Output pointer for the JSON length
///
/// # Returns
///
/// 0 on success, `NoVerdict` (-5) before the first evaluation, other
/// negative codes on failure.
///
/// # Safety
///
/// - `handle` must be a valid handle from `fortdocs_integrity_init`
/// - `verdict_data` and `verdict_len` must be valid pointers
#[no_mangle]
pub unsafe extern "C" fn fortdocs_integrity_last_verdict(
    handle: *mut FortdocsIntegrityHandle,
    verdict_data: *mut *mut u8,
    verdict_len: *mut usize,
) -> i32 {
    if handle.is_null() || verdict_data.is_null() || verdict_len.is_null() {
        return FortdocsIntegrityStatus::InvalidArgument as i32;
    }
    let handle = &*handle;

    let Some(verdict) = handle.gate.last_verdict() else {
        return FortdocsIntegrityStatus::NoVerdict as i32;
    };

    let bytes = match serde_json::to_vec(&verdict) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Failed to serialize verdict: {}", e);
            return FortdocsIntegrityStatus::SerializationError as i32;
        },
    };

    let len = bytes.len();
    let data = libc::malloc(len) as *mut u8;
    if data.is_null() {
        return FortdocsIntegrityStatus::InternalError as i32;
    }
    ptr::copy_nonoverlapping(bytes.as_ptr(), data, len);

    *verdict_data = data;
    *verdict_len = len;
    FortdocsIntegrityStatus::Success as i32
}

/// Free memory returned by this library.
///
/// # Safety
///
/// `data` must be a pointer returned by a fortdocs_integrity function, or NULL.
#[no_mangle]
pub unsafe extern "C" fn fortdocs_integrity_free(data: *mut c_void) {
    if !data.is_null() {
        libc::free(data);
    }
}

/// Destroy the handle and release resources.
///
/// # Safety
///
/// `handle` must be a valid handle from `fortdocs_integrity_init`, or NULL.
/// After this call the handle is invalid and must not be used.
#[no_mangle]
pub unsafe extern "C" fn fortdocs_integrity_destroy(handle: *mut FortdocsIntegrityHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Get the library version as a static NUL-terminated string.
#[no_mangle]
pub extern "C" fn fortdocs_integrity_version() -> *const libc::c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const libc::c_char
}
