//! FFI bindings
//!
//! C-compatible functions for driving the capture pipeline from a host
//! application (the sensor callbacks and the button live on the host side).
//! Strings are null-terminated; every returned string is newly allocated and
//! must be released with `cauth_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::capture::CaptureSession;
use crate::config::AuthConfig;
use crate::enrollment::average_vectors;
use crate::error::AuthError;
use crate::matcher::{clamp_values, distance};
use crate::types::{FeatureVector, SensorReading, SensorStreamId};

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

fn json_result<T: serde::Serialize>(result: Result<T, AuthError>) -> *mut c_char {
    match result.and_then(|value| Ok(serde_json::to_string(&value)?)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

fn status(result: Result<(), AuthError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

fn stream_from_code(code: i32) -> Option<SensorStreamId> {
    usize::try_from(code)
        .ok()
        .and_then(|i| SensorStreamId::ALL.get(i).copied())
}

// ============================================================================
// Capture Session API
// ============================================================================

/// Opaque handle to a CaptureSession
pub struct CaptureSessionHandle {
    session: CaptureSession,
}

/// Create a capture session keeping `window_capacity` samples per stream and phase.
///
/// # Safety
/// - Returns a pointer that must be freed with `cauth_session_free`.
/// - A non-positive capacity selects the default (10).
/// - Returns NULL if the capacity is out of range; call `cauth_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn cauth_session_new(window_capacity: i32) -> *mut CaptureSessionHandle {
    clear_last_error();

    let mut config = AuthConfig::default();
    if window_capacity > 0 {
        config.window_capacity = window_capacity as usize;
    }

    match CaptureSession::try_new(&config) {
        Ok(session) => Box::into_raw(Box::new(CaptureSessionHandle { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a capture session.
///
/// # Safety
/// - `session` must be a pointer returned by `cauth_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn cauth_session_free(session: *mut CaptureSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Push one 3-axis reading. `stream` is 0 (accelerometer), 1 (gyroscope) or 2 (magnetometer).
///
/// # Safety
/// - `session` must be a valid pointer returned by `cauth_session_new`.
/// - Returns 0 on success, -1 on error (see `cauth_last_error`).
#[no_mangle]
pub unsafe extern "C" fn cauth_session_push_sample(
    session: *const CaptureSessionHandle,
    stream: i32,
    x: f32,
    y: f32,
    z: f32,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let Some(stream) = stream_from_code(stream) else {
        set_last_error(&format!("Unknown sensor stream code {stream}"));
        return -1;
    };

    let handle = &*session;
    status(handle.session.on_sample(SensorReading::new(stream, [x, y, z])))
}

/// Mark the start of a user action.
///
/// # Safety
/// - `session` must be a valid pointer returned by `cauth_session_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn cauth_session_begin_capture(session: *const CaptureSessionHandle) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &*session;
    status(handle.session.begin_capture())
}

/// Close the action and return its 144-value feature vector as a JSON array.
///
/// # Safety
/// - `session` must be a valid pointer returned by `cauth_session_new`.
/// - Returns a newly allocated string that must be freed with `cauth_free_string`.
/// - Returns NULL on error; call `cauth_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cauth_session_end_capture(
    session: *const CaptureSessionHandle,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &*session;
    json_result(handle.session.end_capture())
}

/// Discard all buffered samples and leave capture mode.
///
/// # Safety
/// - `session` must be a valid pointer returned by `cauth_session_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn cauth_session_reset(session: *const CaptureSessionHandle) {
    if !session.is_null() {
        (*session).session.reset();
    }
}

// ============================================================================
// Vector Utilities
// ============================================================================

/// Average a JSON array of feature vectors.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `cauth_free_string`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn cauth_average_json(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = cstr_to_string(json) else {
        set_last_error("Invalid JSON string pointer");
        return ptr::null_mut();
    };

    json_result(
        serde_json::from_str::<Vec<FeatureVector>>(&json_str)
            .map_err(AuthError::from)
            .and_then(|vectors| average_vectors(&vectors)),
    )
}

/// Clamp every value of a JSON number array into `[lo, hi]`.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `cauth_free_string`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn cauth_clamp_json(json: *const c_char, lo: f32, hi: f32) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = cstr_to_string(json) else {
        set_last_error("Invalid JSON string pointer");
        return ptr::null_mut();
    };

    json_result(
        serde_json::from_str::<Vec<f32>>(&json_str)
            .map_err(AuthError::from)
            .map(|values| clamp_values(&values, lo, hi)),
    )
}

/// Euclidean distance between two JSON number arrays.
///
/// # Safety
/// - `a` and `b` must be valid null-terminated C strings.
/// - Returns a negative value on error; call `cauth_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn cauth_distance_json(a: *const c_char, b: *const c_char) -> f32 {
    clear_last_error();

    let (Some(a_str), Some(b_str)) = (cstr_to_string(a), cstr_to_string(b)) else {
        set_last_error("Invalid JSON string pointer");
        return -1.0;
    };

    let result = serde_json::from_str::<Vec<f32>>(&a_str)
        .and_then(|a| Ok((a, serde_json::from_str::<Vec<f32>>(&b_str)?)))
        .map_err(AuthError::from)
        .and_then(|(a, b)| distance(&a, &b));

    match result {
        Ok(d) => d,
        Err(e) => {
            set_last_error(&e.to_string());
            -1.0
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by this library.
///
/// # Safety
/// - `ptr` must be a pointer returned by a `cauth_*` function, or NULL.
#[no_mangle]
pub unsafe extern "C" fn cauth_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next `cauth_*` call on this thread.
/// - Do NOT free the returned pointer. Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn cauth_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn cauth_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        cauth_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        unsafe {
            let session = cauth_session_new(0);
            assert!(!session.is_null());

            assert_eq!(cauth_session_push_sample(session, 0, 1.0, 0.0, 0.0), 0);
            assert_eq!(cauth_session_push_sample(session, 0, 3.0, 0.0, 0.0), 0);
            assert_eq!(cauth_session_begin_capture(session), 0);
            assert_eq!(cauth_session_push_sample(session, 1, 0.5, 0.0, 0.0), 0);

            let json = take_string(cauth_session_end_capture(session));
            let vector: Vec<f32> = serde_json::from_str(&json).unwrap();
            assert_eq!(vector.len(), 144);
            assert_eq!(&vector[0..4], &[2.0, 1.0, 1.0, 3.0]);

            cauth_session_free(session);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let session = cauth_session_new(10);

            assert_eq!(cauth_session_push_sample(session, 7, 0.0, 0.0, 0.0), -1);
            assert!(!cauth_last_error().is_null());

            // Ending without beginning is rejected
            assert!(cauth_session_end_capture(session).is_null());
            let error = CStr::from_ptr(cauth_last_error()).to_str().unwrap();
            assert!(error.contains("end capture"));

            assert_eq!(cauth_session_begin_capture(ptr::null()), -1);
            cauth_session_free(session);
        }
    }

    #[test]
    fn test_ffi_oversized_window_rejected() {
        unsafe {
            let session = cauth_session_new(i32::MAX);
            assert!(session.is_null());
            let error = CStr::from_ptr(cauth_last_error()).to_str().unwrap();
            assert!(error.contains("window_capacity"));
        }
    }

    #[test]
    fn test_ffi_vector_utilities() {
        unsafe {
            let values = CString::new("[-15.0, 5.0, 12.0]").unwrap();
            let clamped = take_string(cauth_clamp_json(values.as_ptr(), -10.0, 10.0));
            assert_eq!(clamped, "[-10.0,5.0,10.0]");

            let a = CString::new("[0.0, 0.0]").unwrap();
            let b = CString::new("[3.0, 4.0]").unwrap();
            assert_eq!(cauth_distance_json(a.as_ptr(), b.as_ptr()), 5.0);

            let short = CString::new("[1.0]").unwrap();
            assert!(cauth_distance_json(a.as_ptr(), short.as_ptr()) < 0.0);

            let vectors =
                serde_json::to_string(&vec![vec![1.0f32; 144], vec![3.0f32; 144]]).unwrap();
            let vectors = CString::new(vectors).unwrap();
            let average = take_string(cauth_average_json(vectors.as_ptr()));
            let average: Vec<f32> = serde_json::from_str(&average).unwrap();
            assert!(average.iter().all(|v| *v == 2.0));

            let empty = CString::new("[]").unwrap();
            assert!(cauth_average_json(empty.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = CStr::from_ptr(cauth_version()).to_str().unwrap();
            assert!(!version.is_empty());
        }
    }
}
