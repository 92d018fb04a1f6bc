//! Callback registration for streaming requests.
//!
//! # Design
//! A streaming request does not hold its body or its response. Instead the
//! caller registers up to three callbacks and the transport drives them:
//!
//! - the header callback receives each response header line,
//! - the read callback fills the transport's outbound buffer,
//! - the write callback receives each chunk of response body.
//!
//! Contexts are borrowed for `'a`, so the caller keeps ownership and the
//! descriptor cannot outlive them. The descriptor never invokes any of these
//! itself; `on_header`, `read_body` and `write_response` exist for the
//! transport to call, synchronously, on whatever thread it runs on.

use std::fmt;
use std::io;

use tracing::warn;

type HeaderFn<'a> = Box<dyn FnMut(&str) + Send + 'a>;
type ReadFn<'a> = Box<dyn FnMut(&mut [u8]) -> usize + Send + 'a>;
type WriteFn<'a> = Box<dyn FnMut(&[u8]) + Send + 'a>;

/// Callbacks and contexts registered on a streaming request.
pub struct StreamCallbacks<'a> {
    header: Option<HeaderFn<'a>>,
    read: ReadFn<'a>,
    write: Option<WriteFn<'a>>,
    has_write_context: bool,
}

impl<'a> StreamCallbacks<'a> {
    /// Register a read callback together with the context it reads from.
    ///
    /// The callback returns the number of bytes it placed at the front of the
    /// buffer; `0` ends the body.
    pub fn new<R, F>(read_context: &'a mut R, mut read: F) -> Self
    where
        R: Send + ?Sized,
        F: FnMut(&mut R, &mut [u8]) -> usize + Send + 'a,
    {
        Self::from_fn(move |buf: &mut [u8]| read(&mut *read_context, buf))
    }

    /// Register a read callback that carries its own state.
    pub fn from_fn<F>(read: F) -> Self
    where
        F: FnMut(&mut [u8]) -> usize + Send + 'a,
    {
        Self {
            header: None,
            read: Box::new(read),
            write: None,
            has_write_context: false,
        }
    }

    /// Register the response-header callback.
    pub fn with_header_callback<F>(mut self, header: F) -> Self
    where
        F: FnMut(&str) + Send + 'a,
    {
        self.header = Some(Box::new(header));
        self
    }

    /// Register a response-write callback and the context it writes into.
    pub fn with_write_callback<W, F>(mut self, write_context: &'a mut W, mut write: F) -> Self
    where
        W: Send + ?Sized,
        F: FnMut(&mut W, &[u8]) + Send + 'a,
    {
        self.write = Some(Box::new(move |chunk: &[u8]| write(&mut *write_context, chunk)));
        self.has_write_context = true;
        self
    }

    /// Register a response-write callback with no write context.
    pub fn with_write_fn<F>(mut self, write: F) -> Self
    where
        F: FnMut(&[u8]) + Send + 'a,
    {
        self.write = Some(Box::new(write));
        self.has_write_context = false;
        self
    }

    /// Record that a write context exists even though the write callback
    /// does not borrow it, as when the context is a foreign pointer the
    /// callback already closes over.
    pub fn with_external_write_context(mut self) -> Self {
        self.has_write_context = true;
        self
    }

    pub fn has_header_callback(&self) -> bool {
        self.header.is_some()
    }

    pub fn has_write_callback(&self) -> bool {
        self.write.is_some()
    }

    /// Whether the write callback was registered with a write context.
    pub fn has_write_context(&self) -> bool {
        self.has_write_context
    }

    /// Deliver one raw response header line. No-op without a header callback.
    ///
    /// Lines are UTF-8. A transport holding non-UTF-8 header bytes converts
    /// them lossily rather than dropping them.
    pub fn on_header(&mut self, line: &str) {
        if let Some(header) = self.header.as_mut() {
            header(line);
        }
    }

    /// Ask the caller for more outbound body bytes.
    ///
    /// Returns how many bytes at the front of `buf` are valid. A count larger
    /// than the buffer is clamped to its length.
    pub fn read_body(&mut self, buf: &mut [u8]) -> usize {
        let supplied = (self.read)(buf);
        if supplied > buf.len() {
            warn!(
                supplied,
                capacity = buf.len(),
                "read callback reported more bytes than the buffer holds"
            );
            return buf.len();
        }
        supplied
    }

    /// Deliver one chunk of response body. No-op without a write callback.
    pub fn write_response(&mut self, chunk: &[u8]) {
        if let Some(write) = self.write.as_mut() {
            write(chunk);
        }
    }

    /// View the read callback as an [`io::Read`] body source.
    pub fn body_reader(&mut self) -> BodyReader<'_, 'a> {
        BodyReader { callbacks: self }
    }

    /// View the write callback as an [`io::Write`] response sink.
    pub fn response_writer(&mut self) -> ResponseWriter<'_, 'a> {
        ResponseWriter { callbacks: self }
    }
}

impl fmt::Debug for StreamCallbacks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCallbacks")
            .field("header", &self.has_header_callback())
            .field("write", &self.has_write_callback())
            .field("write_context", &self.has_write_context)
            .finish_non_exhaustive()
    }
}

/// [`io::Read`] adapter over a registered read callback.
pub struct BodyReader<'s, 'a> {
    callbacks: &'s mut StreamCallbacks<'a>,
}

impl io::Read for BodyReader<'_, '_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.callbacks.read_body(buf))
    }
}

/// [`io::Write`] adapter over a registered write callback.
pub struct ResponseWriter<'s, 'a> {
    callbacks: &'s mut StreamCallbacks<'a>,
}

impl io::Write for ResponseWriter<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.callbacks.write_response(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
