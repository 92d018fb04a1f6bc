//! Error types for the request descriptor core.
//!
//! # Design
//! Only URL decomposition and verb parsing can fail recoverably. A missing
//! header is a normal outcome (`Option::None`), and a streaming request
//! without a read context cannot be expressed in safe Rust at all, so
//! neither has an error variant here.

use thiserror::Error;

/// Errors returned by the URL decomposer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    /// The URL has no `"://"` separating the scheme from the host.
    ///
    /// Scheme, host and path extraction all report this. Query extraction
    /// never does.
    #[error("malformed URL {url:?}: missing \"://\" scheme delimiter")]
    MissingSchemeDelimiter { url: String },
}

/// Returned when a string does not name a supported HTTP verb.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported HTTP verb: {0:?}")]
pub struct ParseVerbError(pub String);
