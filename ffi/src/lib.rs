//! C-ABI wrapper around `request-core`.
//!
//! # Overview
//! Exposes the request descriptor through `extern "C"` functions so a
//! transport written in C (or any language with a C FFI) can build requests,
//! register streaming callbacks, and read every field back.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary. The one exception is a streaming request
//!   with a null read context, which aborts the process.
//! - Fallible functions return `FfiErrorCode` and write results through out
//!   pointers.
//! - Strings returned through out pointers are owned by the caller and must
//!   be released with `req_free_string`. `req_get_body` returns a borrowed
//!   pointer that stays valid until the next `req_set_body` or
//!   `req_request_free`.
//! - Callback contexts stay owned by the C caller. The request stores them
//!   unmodified and never frees them.

pub mod types;

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, UNIX_EPOCH};

use request_core::{Request, UrlError};
use tracing::error;

use types::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `catch_unwind` for closures that touch an `FfiRequest`.
///
/// Requests hold boxed callbacks, which are not `RefUnwindSafe`. No function
/// here leaves a request half-updated when it panics.
fn catch_panic<T>(f: impl FnOnce() -> T) -> std::thread::Result<T> {
    catch_unwind(AssertUnwindSafe(f))
}

/// Run `f`, converting a panic into `FfiErrorCode::Panic`.
fn guard<F>(function: &'static str, f: F) -> FfiErrorCode
where
    F: FnOnce() -> FfiErrorCode,
{
    catch_panic(f).unwrap_or_else(|_| {
        error!(function, "panic caught at FFI boundary");
        FfiErrorCode::Panic
    })
}

/// Borrow a C string as `&str`.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'s`.
unsafe fn read_str<'s>(ptr: *const c_char) -> Result<&'s str, FfiErrorCode> {
    if ptr.is_null() {
        return Err(FfiErrorCode::NullArg);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| FfiErrorCode::InvalidUtf8)
}

/// Copy `value` into a newly allocated C string stored at `out`.
fn write_string(out: *mut *mut c_char, value: &str) -> FfiErrorCode {
    match CString::new(value) {
        Ok(s) => {
            unsafe { *out = s.into_raw() };
            FfiErrorCode::Ok
        }
        Err(_) => FfiErrorCode::InteriorNul,
    }
}

/// Like `write_string`, for URL components that may be malformed.
fn write_url_part(out: *mut *mut c_char, part: Result<&str, UrlError>) -> FfiErrorCode {
    match part {
        Ok(value) => write_string(out, value),
        Err(UrlError::MissingSchemeDelimiter { .. }) => FfiErrorCode::MalformedUrl,
    }
}

fn millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Request lifecycle
// ---------------------------------------------------------------------------

/// Create a one-shot request.
///
/// Returns null if `url` is null or not UTF-8, or if `verb` is out of range.
/// The caller must free the returned pointer with `req_request_free`.
#[unsafe(no_mangle)]
pub extern "C" fn req_request_new(verb: u32, url: *const c_char) -> *mut FfiRequest {
    catch_unwind(|| {
        let Some(verb) = verb_from_code(verb) else {
            return std::ptr::null_mut();
        };
        let Ok(url) = (unsafe { read_str(url) }) else {
            return std::ptr::null_mut();
        };
        let request = FfiRequest {
            inner: Request::new(verb, url),
            raw: None,
        };
        Box::into_raw(Box::new(request))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Create a streaming request.
///
/// Any callback may be null. `read_ctx` must not be null: passing null is a
/// programming error and aborts the process. `write_ctx` may be null.
/// Both contexts remain owned by the caller and must outlive the request.
///
/// Returns null if `url` is null or not UTF-8, or if `verb` is out of range.
/// The caller must free the returned pointer with `req_request_free`.
#[unsafe(no_mangle)]
pub extern "C" fn req_request_new_streaming(
    verb: u32,
    url: *const c_char,
    header_cb: FfiHeaderCallback,
    read_cb: FfiReadCallback,
    read_ctx: *mut c_void,
    write_cb: FfiWriteCallback,
    write_ctx: *mut c_void,
) -> *mut FfiRequest {
    let raw = match catch_unwind(|| {
        RawStreamCallbacks::new(header_cb, read_cb, read_ctx, write_cb, write_ctx)
    }) {
        Ok(raw) => raw,
        Err(_) => {
            error!("req_request_new_streaming called with a null read context");
            std::process::abort();
        }
    };

    catch_unwind(|| {
        let Some(verb) = verb_from_code(verb) else {
            return std::ptr::null_mut();
        };
        let Ok(url) = (unsafe { read_str(url) }) else {
            return std::ptr::null_mut();
        };
        let request = FfiRequest {
            inner: Request::streaming(verb, url, raw.to_core()),
            raw: Some(raw),
        };
        Box::into_raw(Box::new(request))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a request created by `req_request_new*`. Safe to call with null.
/// Registered contexts are not touched.
#[unsafe(no_mangle)]
pub extern "C" fn req_request_free(req: *mut FfiRequest) {
    if !req.is_null() {
        let _ = catch_panic(|| {
            drop(unsafe { Box::from_raw(req) });
        });
    }
}

// ---------------------------------------------------------------------------
// Mutators
// ---------------------------------------------------------------------------

/// Replace the body with `len` bytes copied from `body`. `body` may be null
/// only when `len` is 0.
#[unsafe(no_mangle)]
pub extern "C" fn req_set_body(req: *mut FfiRequest, body: *const u8, len: usize) -> FfiErrorCode {
    guard("req_set_body", || {
        if req.is_null() || (body.is_null() && len > 0) {
            return FfiErrorCode::NullArg;
        }
        let bytes = if len == 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(body, len) }.to_vec()
        };
        unsafe { &mut *req }.inner.set_body(bytes);
        FfiErrorCode::Ok
    })
}

/// Insert or overwrite a header.
#[unsafe(no_mangle)]
pub extern "C" fn req_set_header(
    req: *mut FfiRequest,
    name: *const c_char,
    value: *const c_char,
) -> FfiErrorCode {
    guard("req_set_header", || {
        if req.is_null() {
            return FfiErrorCode::NullArg;
        }
        let (name, value) = match unsafe { (read_str(name), read_str(value)) } {
            (Ok(name), Ok(value)) => (name, value),
            (Err(code), _) | (_, Err(code)) => return code,
        };
        unsafe { &mut *req }.inner.set_header(name, value);
        FfiErrorCode::Ok
    })
}

/// Set the request completion timeout in milliseconds. 0 means unset.
#[unsafe(no_mangle)]
pub extern "C" fn req_set_request_completion_timeout_ms(req: *mut FfiRequest, ms: u64) -> FfiErrorCode {
    guard("req_set_request_completion_timeout_ms", || {
        if req.is_null() {
            return FfiErrorCode::NullArg;
        }
        unsafe { &mut *req }
            .inner
            .set_request_completion_timeout(Duration::from_millis(ms));
        FfiErrorCode::Ok
    })
}

/// Set the connection timeout in milliseconds. 0 means unset.
#[unsafe(no_mangle)]
pub extern "C" fn req_set_connection_timeout_ms(req: *mut FfiRequest, ms: u64) -> FfiErrorCode {
    guard("req_set_connection_timeout_ms", || {
        if req.is_null() {
            return FfiErrorCode::NullArg;
        }
        unsafe { &mut *req }
            .inner
            .set_connection_timeout(Duration::from_millis(ms));
        FfiErrorCode::Ok
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn req_set_url(req: *mut FfiRequest, url: *const c_char) -> FfiErrorCode {
    guard("req_set_url", || {
        if req.is_null() {
            return FfiErrorCode::NullArg;
        }
        match unsafe { read_str(url) } {
            Ok(url) => {
                unsafe { &mut *req }.inner.set_url(url);
                FfiErrorCode::Ok
            }
            Err(code) => code,
        }
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn req_set_verb(req: *mut FfiRequest, verb: u32) -> FfiErrorCode {
    guard("req_set_verb", || {
        if req.is_null() {
            return FfiErrorCode::NullArg;
        }
        match verb_from_code(verb) {
            Some(verb) => {
                unsafe { &mut *req }.inner.set_verb(verb);
                FfiErrorCode::Ok
            }
            None => FfiErrorCode::InvalidVerb,
        }
    })
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

/// Borrow the body. Writes its length to `out_len` and returns a pointer
/// that stays valid until the next `req_set_body` or `req_request_free`.
///
/// Returns null (and writes 0) if `req` is null or the body is empty.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_body(req: *const FfiRequest, out_len: *mut usize) -> *const u8 {
    catch_panic(|| {
        if out_len.is_null() {
            return std::ptr::null();
        }
        if req.is_null() {
            unsafe { *out_len = 0 };
            return std::ptr::null();
        }
        let body = unsafe { &*req }.inner.body();
        unsafe { *out_len = body.len() };
        if body.is_empty() {
            std::ptr::null()
        } else {
            body.as_ptr()
        }
    })
    .unwrap_or(std::ptr::null())
}

/// Look up a header. Returns `NotFound` when it is not set; a header set to
/// the empty string is found and yields an empty string.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_header(
    req: *const FfiRequest,
    name: *const c_char,
    out_value: *mut *mut c_char,
) -> FfiErrorCode {
    guard("req_get_header", || {
        if req.is_null() || out_value.is_null() {
            return FfiErrorCode::NullArg;
        }
        let name = match unsafe { read_str(name) } {
            Ok(name) => name,
            Err(code) => return code,
        };
        match unsafe { &*req }.inner.header(name) {
            Some(value) => write_string(out_value, value),
            None => FfiErrorCode::NotFound,
        }
    })
}

/// Number of headers currently set. Returns 0 if `req` is null.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_header_count(req: *const FfiRequest) -> usize {
    if req.is_null() {
        return 0;
    }
    catch_panic(|| unsafe { &*req }.inner.headers().len()).unwrap_or(0)
}

/// Copy the header at `index` into `out_name` and `out_value`.
///
/// Headers are indexed in name order, from 0 to `req_get_header_count - 1`;
/// an index past the end returns `NotFound`. Indices are stable until the
/// next `req_set_header`. Both strings are freed with `req_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_header_at(
    req: *const FfiRequest,
    index: usize,
    out_name: *mut *mut c_char,
    out_value: *mut *mut c_char,
) -> FfiErrorCode {
    guard("req_get_header_at", || {
        if req.is_null() || out_name.is_null() || out_value.is_null() {
            return FfiErrorCode::NullArg;
        }
        let headers = unsafe { &*req }.inner.headers();
        let names = headers.sorted_names();
        let Some(name) = names.get(index) else {
            return FfiErrorCode::NotFound;
        };
        let value = headers.get(name).unwrap_or_default();
        let (Ok(name), Ok(value)) = (CString::new(name.as_str()), CString::new(value)) else {
            return FfiErrorCode::InteriorNul;
        };
        unsafe {
            *out_name = name.into_raw();
            *out_value = value.into_raw();
        }
        FfiErrorCode::Ok
    })
}

/// Copy the request id (a UUID string) into `out`.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_id(req: *const FfiRequest, out: *mut *mut c_char) -> FfiErrorCode {
    guard("req_get_id", || {
        if req.is_null() || out.is_null() {
            return FfiErrorCode::NullArg;
        }
        write_string(out, &unsafe { &*req }.inner.id().to_string())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn req_get_url(req: *const FfiRequest, out: *mut *mut c_char) -> FfiErrorCode {
    guard("req_get_url", || {
        if req.is_null() || out.is_null() {
            return FfiErrorCode::NullArg;
        }
        write_string(out, unsafe { &*req }.inner.url())
    })
}

/// Returns `MalformedUrl` if the URL has no `"://"`.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_scheme(req: *const FfiRequest, out: *mut *mut c_char) -> FfiErrorCode {
    guard("req_get_scheme", || {
        if req.is_null() || out.is_null() {
            return FfiErrorCode::NullArg;
        }
        write_url_part(out, unsafe { &*req }.inner.scheme())
    })
}

/// Returns `MalformedUrl` if the URL has no `"://"`.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_host(req: *const FfiRequest, out: *mut *mut c_char) -> FfiErrorCode {
    guard("req_get_host", || {
        if req.is_null() || out.is_null() {
            return FfiErrorCode::NullArg;
        }
        write_url_part(out, unsafe { &*req }.inner.host())
    })
}

/// Returns `MalformedUrl` if the URL has no `"://"`. A URL without a path
/// yields an empty string.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_path(req: *const FfiRequest, out: *mut *mut c_char) -> FfiErrorCode {
    guard("req_get_path", || {
        if req.is_null() || out.is_null() {
            return FfiErrorCode::NullArg;
        }
        write_url_part(out, unsafe { &*req }.inner.path())
    })
}

/// Never reports `MalformedUrl`; a URL without `?` yields an empty string.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_query(req: *const FfiRequest, out: *mut *mut c_char) -> FfiErrorCode {
    guard("req_get_query", || {
        if req.is_null() || out.is_null() {
            return FfiErrorCode::NullArg;
        }
        write_string(out, unsafe { &*req }.inner.query())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn req_get_verb(req: *const FfiRequest, out: *mut FfiVerb) -> FfiErrorCode {
    guard("req_get_verb", || {
        if req.is_null() || out.is_null() {
            return FfiErrorCode::NullArg;
        }
        let verb = unsafe { &*req }.inner.verb();
        unsafe { *out = verb.into() };
        FfiErrorCode::Ok
    })
}

/// Creation time in milliseconds since the Unix epoch. Returns 0 if `req`
/// is null.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_creation_time_ms(req: *const FfiRequest) -> u64 {
    if req.is_null() {
        return 0;
    }
    catch_panic(|| {
        unsafe { &*req }
            .inner
            .creation_time()
            .duration_since(UNIX_EPOCH)
            .map(millis)
            .unwrap_or(0)
    })
    .unwrap_or(0)
}

/// Returns 0 (unset) if `req` is null.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_request_completion_timeout_ms(req: *const FfiRequest) -> u64 {
    if req.is_null() {
        return 0;
    }
    catch_panic(|| millis(unsafe { &*req }.inner.request_completion_timeout())).unwrap_or(0)
}

/// Returns 0 (unset) if `req` is null.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_connection_timeout_ms(req: *const FfiRequest) -> u64 {
    if req.is_null() {
        return 0;
    }
    catch_panic(|| millis(unsafe { &*req }.inner.connection_timeout())).unwrap_or(0)
}

/// Returns false if `req` is null.
#[unsafe(no_mangle)]
pub extern "C" fn req_is_streaming(req: *const FfiRequest) -> bool {
    if req.is_null() {
        return false;
    }
    catch_panic(|| unsafe { &*req }.inner.is_streaming()).unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Streaming callback getters
// ---------------------------------------------------------------------------

/// Registered callbacks, or `None` for null or one-shot requests.
fn raw_callbacks(req: *const FfiRequest) -> Option<RawStreamCallbacks> {
    if req.is_null() {
        return None;
    }
    unsafe { &*req }.raw
}

/// Null for one-shot requests or when no header callback was registered.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_post_header_callback(req: *const FfiRequest) -> FfiHeaderCallback {
    raw_callbacks(req).and_then(|raw| raw.header)
}

/// Null for one-shot requests or when no read callback was registered.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_post_read_callback(req: *const FfiRequest) -> FfiReadCallback {
    raw_callbacks(req).and_then(|raw| raw.read)
}

/// The read context exactly as registered. Null for one-shot requests.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_post_read_context(req: *const FfiRequest) -> *mut c_void {
    raw_callbacks(req).map_or(std::ptr::null_mut(), |raw| raw.read_ctx)
}

/// Null for one-shot requests or when no write callback was registered.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_post_write_callback(req: *const FfiRequest) -> FfiWriteCallback {
    raw_callbacks(req).and_then(|raw| raw.write)
}

/// The write context exactly as registered, which may be null.
#[unsafe(no_mangle)]
pub extern "C" fn req_get_post_write_context(req: *const FfiRequest) -> *mut c_void {
    raw_callbacks(req).map_or(std::ptr::null_mut(), |raw| raw.write_ctx)
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn req_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
