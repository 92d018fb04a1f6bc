//! Outbound HTTP request descriptor for host-driven transports.
//!
//! # Overview
//! Describes an HTTP request as data that a separate transport executes
//! (host-does-IO pattern). Nothing in this crate opens a socket, spawns a
//! thread, or blocks. Two request shapes are supported:
//!
//! - **one-shot**: the body is fully materialized in the descriptor;
//! - **streaming**: the transport pulls the body and pushes the response
//!   through callbacks registered on the descriptor.
//!
//! # Design
//! - `Request` is built by the caller, handed to the transport, and used for
//!   exactly one attempt.
//! - The `url` module splits `scheme://host[:port][/path][?query]` strings
//!   with plain delimiter search; there is no full URI grammar.
//! - Streaming contexts are borrowed (`StreamCallbacks<'a>`), so the caller
//!   keeps ownership and the descriptor cannot outlive them.

pub mod error;
pub mod headers;
pub mod request;
pub mod stream;
pub mod summary;
pub mod url;
pub mod verb;

pub use error::{ParseVerbError, UrlError};
pub use headers::Headers;
pub use request::Request;
pub use stream::{BodyReader, ResponseWriter, StreamCallbacks};
pub use summary::RequestSummary;
pub use url::UrlParts;
pub use verb::Verb;
