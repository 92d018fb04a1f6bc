//! Serializable snapshot of a request descriptor.
//!
//! # Design
//! Header values and body bytes are left out on purpose: summaries end up in
//! log sinks, and those commonly carry credentials or media payloads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::verb::Verb;

/// Read-only view of a `Request` taken at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub id: Uuid,
    pub verb: Verb,
    pub url: String,
    /// Sorted so that summaries compare deterministically.
    pub header_names: Vec<String>,
    pub body_len: usize,
    pub streaming: bool,
    /// Zero when left to the transport.
    pub request_completion_timeout_ms: u64,
    /// Zero when left to the transport.
    pub connection_timeout_ms: u64,
}
