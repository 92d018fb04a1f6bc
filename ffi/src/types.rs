//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with a C-compatible representation: verbs
//! and error codes are explicit-discriminant enums, callbacks are nullable
//! `extern "C"` function pointers, and contexts are `void*`. The raw
//! callbacks are kept next to the core request so the getters can hand back
//! exactly what the caller registered.

use std::ffi::c_void;
use std::os::raw::c_char;

use request_core::{Request, StreamCallbacks, Verb};

/// Opaque handle to a `Request`. C callers receive a pointer to this and
/// pass it back into every FFI function.
pub struct FfiRequest {
    pub(crate) inner: Request<'static>,
    pub(crate) raw: Option<RawStreamCallbacks>,
}

// ---------------------------------------------------------------------------
// Verb
// ---------------------------------------------------------------------------

/// HTTP verb as a C enum. Functions take the discriminant as `uint32_t` so
/// out-of-range values can be rejected instead of being undefined behavior.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiVerb {
    Get = 0,
    Post = 1,
    Put = 2,
    Delete = 3,
    Head = 4,
    Patch = 5,
    Options = 6,
}

impl From<Verb> for FfiVerb {
    fn from(v: Verb) -> Self {
        match v {
            Verb::Get => FfiVerb::Get,
            Verb::Post => FfiVerb::Post,
            Verb::Put => FfiVerb::Put,
            Verb::Delete => FfiVerb::Delete,
            Verb::Head => FfiVerb::Head,
            Verb::Patch => FfiVerb::Patch,
            Verb::Options => FfiVerb::Options,
        }
    }
}

/// Map a C verb discriminant to a core `Verb`.
pub(crate) fn verb_from_code(code: u32) -> Option<Verb> {
    match code {
        0 => Some(Verb::Get),
        1 => Some(Verb::Post),
        2 => Some(Verb::Put),
        3 => Some(Verb::Delete),
        4 => Some(Verb::Head),
        5 => Some(Verb::Patch),
        6 => Some(Verb::Options),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Status returned by every fallible FFI function.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    NullArg = 1,
    InvalidUtf8 = 2,
    /// A returned string would contain an interior NUL byte.
    InteriorNul = 3,
    /// The URL has no `"://"` scheme delimiter.
    MalformedUrl = 4,
    /// The requested header is not set. Not a failure of the call itself.
    NotFound = 5,
    InvalidVerb = 6,
    Panic = 7,
}

// ---------------------------------------------------------------------------
// Streaming callbacks
// ---------------------------------------------------------------------------

/// Receives one response header line. `line` is not NUL-terminated.
pub type FfiHeaderCallback = Option<unsafe extern "C" fn(line: *const c_char, len: usize)>;

/// Fills up to `capacity` bytes at `buf` and returns how many were written;
/// `0` ends the body.
pub type FfiReadCallback =
    Option<unsafe extern "C" fn(buf: *mut u8, capacity: usize, ctx: *mut c_void) -> usize>;

/// Receives one chunk of response body.
pub type FfiWriteCallback =
    Option<unsafe extern "C" fn(chunk: *const u8, len: usize, ctx: *mut c_void)>;

/// Callbacks and contexts exactly as the C caller registered them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawStreamCallbacks {
    pub(crate) header: FfiHeaderCallback,
    pub(crate) read: FfiReadCallback,
    pub(crate) read_ctx: *mut c_void,
    pub(crate) write: FfiWriteCallback,
    pub(crate) write_ctx: *mut c_void,
}

// The contexts belong to the C caller, who guarantees they stay valid and
// usable from the transport's thread for the life of the request.
unsafe impl Send for RawStreamCallbacks {}

impl RawStreamCallbacks {
    /// # Panics
    /// Panics if `read_ctx` is null: a streaming request without a data
    /// source is a caller bug.
    pub(crate) fn new(
        header: FfiHeaderCallback,
        read: FfiReadCallback,
        read_ctx: *mut c_void,
        write: FfiWriteCallback,
        write_ctx: *mut c_void,
    ) -> Self {
        assert!(
            !read_ctx.is_null(),
            "streaming request requires a non-null read context"
        );
        Self {
            header,
            read,
            read_ctx,
            write,
            write_ctx,
        }
    }

    fn deliver_header(&self, line: &str) {
        if let Some(header) = self.header {
            unsafe { header(line.as_ptr().cast(), line.len()) };
        }
    }

    fn fill(&self, buf: &mut [u8]) -> usize {
        match self.read {
            Some(read) => unsafe { read(buf.as_mut_ptr(), buf.len(), self.read_ctx) },
            None => 0,
        }
    }

    fn deliver_chunk(&self, chunk: &[u8]) {
        if let Some(write) = self.write {
            unsafe { write(chunk.as_ptr(), chunk.len(), self.write_ctx) };
        }
    }

    /// Wrap the raw function pointers as core callbacks, so Rust transports
    /// can drive a request built through the C API.
    pub(crate) fn to_core(self) -> StreamCallbacks<'static> {
        let mut callbacks = StreamCallbacks::from_fn(move |buf: &mut [u8]| self.fill(buf));
        if self.header.is_some() {
            callbacks = callbacks.with_header_callback(move |line: &str| self.deliver_header(line));
        }
        if self.write.is_some() {
            callbacks = callbacks.with_write_fn(move |chunk: &[u8]| self.deliver_chunk(chunk));
        }
        if !self.write_ctx.is_null() {
            callbacks = callbacks.with_external_write_context();
        }
        callbacks
    }
}
