//! The outbound request descriptor.
//!
//! # Design
//! `Request` is plain data plus, for streaming requests, a set of registered
//! callbacks. It performs no I/O: the caller builds it, hands it to a
//! transport, and the transport reads it once per attempt. Streaming vs.
//! one-shot is fixed by which constructor was used and cannot change later.
//!
//! Timeouts use `Duration::ZERO` to mean "not configured", which lets the
//! transport apply its own default.

use std::time::{Duration, SystemTime};

use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::UrlError;
use crate::headers::Headers;
use crate::stream::StreamCallbacks;
use crate::summary::RequestSummary;
use crate::url::{self, UrlParts};
use crate::verb::Verb;

enum Shape<'a> {
    OneShot,
    Streaming(StreamCallbacks<'a>),
}

/// An HTTP request described as data for a transport to execute.
///
/// One instance describes one attempt. `'a` is the lifetime of any contexts
/// borrowed by streaming callbacks; one-shot requests can use `'static`.
pub struct Request<'a> {
    id: Uuid,
    creation_time: SystemTime,
    verb: Verb,
    url: String,
    headers: Headers,
    body: Vec<u8>,
    request_completion_timeout: Duration,
    connection_timeout: Duration,
    shape: Shape<'a>,
}

impl<'a> Request<'a> {
    /// Create a one-shot request with an empty body, no headers and no
    /// timeouts.
    pub fn new(verb: Verb, url: impl Into<String>) -> Self {
        let request = Self::with_shape(verb, url.into(), Shape::OneShot);
        debug!(
            request_id = %request.id,
            verb = %request.verb,
            url = %request.url,
            streaming = false,
            "request created"
        );
        request
    }

    /// Create a streaming request driven by `callbacks`.
    pub fn streaming(verb: Verb, url: impl Into<String>, callbacks: StreamCallbacks<'a>) -> Self {
        let request = Self::with_shape(verb, url.into(), Shape::Streaming(callbacks));
        debug!(
            request_id = %request.id,
            verb = %request.verb,
            url = %request.url,
            streaming = true,
            "request created"
        );
        request
    }

    fn with_shape(verb: Verb, url: String, shape: Shape<'a>) -> Self {
        Self {
            id: Uuid::new_v4(),
            creation_time: SystemTime::now(),
            verb,
            url,
            headers: Headers::new(),
            body: Vec::new(),
            request_completion_timeout: Duration::ZERO,
            connection_timeout: Duration::ZERO,
            shape,
        }
    }

    // -----------------------------------------------------------------------
    // Mutators
    // -----------------------------------------------------------------------

    /// Replace the body. The previous body is discarded, never appended to.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.body = body.into();
        trace!(request_id = %self.id, body_len = self.body.len(), "body replaced");
        self
    }

    /// Insert or overwrite a header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        trace!(request_id = %self.id, header = %name, "header set");
        self.headers.insert(name, value);
        self
    }

    /// Time allowed for the whole request. Zero leaves it to the transport.
    pub fn set_request_completion_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.request_completion_timeout = timeout;
        trace!(request_id = %self.id, ?timeout, "request completion timeout set");
        self
    }

    /// Time allowed to establish the connection. Zero leaves it to the
    /// transport.
    pub fn set_connection_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.connection_timeout = timeout;
        trace!(request_id = %self.id, ?timeout, "connection timeout set");
        self
    }

    pub fn set_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.url = url.into();
        trace!(request_id = %self.id, url = %self.url, "url set");
        self
    }

    pub fn set_verb(&mut self, verb: Verb) -> &mut Self {
        self.verb = verb;
        trace!(request_id = %self.id, %verb, "verb set");
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Identifier used to correlate log events for this request.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn creation_time(&self) -> SystemTime {
        self.creation_time
    }

    /// Look up a header by exact, case-sensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn request_completion_timeout(&self) -> Duration {
        self.request_completion_timeout
    }

    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// The request completion timeout, or `None` when left to the transport.
    pub fn configured_request_completion_timeout(&self) -> Option<Duration> {
        configured(self.request_completion_timeout)
    }

    /// The connection timeout, or `None` when left to the transport.
    pub fn configured_connection_timeout(&self) -> Option<Duration> {
        configured(self.connection_timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn scheme(&self) -> Result<&str, UrlError> {
        url::scheme(&self.url)
    }

    pub fn host(&self) -> Result<&str, UrlError> {
        url::host(&self.url)
    }

    pub fn path(&self) -> Result<&str, UrlError> {
        url::path(&self.url)
    }

    pub fn query(&self) -> &str {
        url::query(&self.url)
    }

    pub fn url_parts(&self) -> Result<UrlParts<'_>, UrlError> {
        url::decompose(&self.url)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.shape, Shape::Streaming(_))
    }

    /// Registered callbacks, or `None` for a one-shot request.
    pub fn stream_callbacks(&self) -> Option<&StreamCallbacks<'a>> {
        match &self.shape {
            Shape::OneShot => None,
            Shape::Streaming(callbacks) => Some(callbacks),
        }
    }

    /// Mutable access to the registered callbacks, for the transport to
    /// invoke them.
    pub fn stream_callbacks_mut(&mut self) -> Option<&mut StreamCallbacks<'a>> {
        match &mut self.shape {
            Shape::OneShot => None,
            Shape::Streaming(callbacks) => Some(callbacks),
        }
    }

    /// Snapshot for logging. Contains no header values and no body bytes.
    pub fn summary(&self) -> RequestSummary {
        RequestSummary {
            id: self.id,
            verb: self.verb,
            url: self.url.clone(),
            header_names: self.headers.sorted_names(),
            body_len: self.body.len(),
            streaming: self.is_streaming(),
            request_completion_timeout_ms: millis(self.request_completion_timeout),
            connection_timeout_ms: millis(self.connection_timeout),
        }
    }
}

impl std::fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("verb", &self.verb)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("request_completion_timeout", &self.request_completion_timeout)
            .field("connection_timeout", &self.connection_timeout)
            .field("stream_callbacks", &self.stream_callbacks())
            .finish()
    }
}

fn configured(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

fn millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn request() -> Request<'static> {
        Request::new(Verb::Get, "https://example.com:8080/a/b?x=1")
    }

    #[test]
    fn new_request_has_empty_defaults() {
        let req = request();
        assert_eq!(req.verb(), Verb::Get);
        assert!(req.body().is_empty());
        assert!(req.headers().is_empty());
        assert_eq!(req.request_completion_timeout(), Duration::ZERO);
        assert_eq!(req.connection_timeout(), Duration::ZERO);
        assert_eq!(req.configured_connection_timeout(), None);
        assert!(!req.is_streaming());
        assert!(req.stream_callbacks().is_none());
    }

    #[test]
    fn header_last_write_wins() {
        let mut req = request();
        req.set_header("A", "1").set_header("A", "2");
        assert_eq!(req.header("A"), Some("2"));
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.header("a"), None);
    }

    #[test]
    fn body_is_replaced_not_appended() {
        let mut req = request();
        req.set_body("x");
        req.set_body("yz");
        assert_eq!(req.body(), b"yz");

        req.set_body(vec![0u8, 1, 2]);
        assert_eq!(req.body(), &[0, 1, 2]);
    }

    #[test]
    fn timeouts_round_trip() {
        let mut req = request();
        req.set_connection_timeout(Duration::from_millis(5))
            .set_request_completion_timeout(Duration::from_secs(30));
        assert_eq!(req.connection_timeout(), Duration::from_millis(5));
        assert_eq!(req.request_completion_timeout(), Duration::from_secs(30));
        assert_eq!(
            req.configured_connection_timeout(),
            Some(Duration::from_millis(5))
        );

        req.set_connection_timeout(Duration::ZERO);
        assert_eq!(req.configured_connection_timeout(), None);
    }

    #[test]
    fn url_accessors_follow_set_url() {
        let mut req = request();
        assert_eq!(req.scheme().unwrap(), "https");
        assert_eq!(req.host().unwrap(), "example.com");
        assert_eq!(req.path().unwrap(), "/a/b");
        assert_eq!(req.query(), "x=1");

        req.set_url("not-a-url");
        assert!(matches!(
            req.host(),
            Err(UrlError::MissingSchemeDelimiter { .. })
        ));
        assert_eq!(req.query(), "");
    }

    #[test]
    fn set_verb_replaces_verb() {
        let mut req = request();
        req.set_verb(Verb::Put);
        assert_eq!(req.verb(), Verb::Put);
    }

    #[test]
    fn creation_time_is_fixed() {
        let before = SystemTime::now();
        let mut req = request();
        let created = req.creation_time();
        req.set_url("http://other/");
        assert_eq!(req.creation_time(), created);
        assert!(created >= before);
    }

    #[test]
    fn streaming_request_exposes_callbacks() {
        let mut fragments = vec![b"one".to_vec(), b"two".to_vec()].into_iter();
        let mut acks: Vec<u8> = Vec::new();
        let callbacks = StreamCallbacks::new(&mut fragments, |it, buf: &mut [u8]| match it.next() {
            Some(fragment) => {
                buf[..fragment.len()].copy_from_slice(&fragment);
                fragment.len()
            }
            None => 0,
        })
        .with_write_callback(&mut acks, |acks: &mut Vec<u8>, chunk| {
            acks.extend_from_slice(chunk)
        });

        let mut req = Request::streaming(Verb::Put, "http://localhost/fragments/cam1", callbacks);
        assert!(req.is_streaming());

        let stream = req.stream_callbacks_mut().unwrap();
        assert!(!stream.has_header_callback());
        assert!(stream.has_write_callback());

        let mut buf = [0u8; 8];
        assert_eq!(stream.read_body(&mut buf), 3);
        assert_eq!(&buf[..3], b"one");
        assert_eq!(stream.read_body(&mut buf), 3);
        assert_eq!(stream.read_body(&mut buf), 0);
        stream.write_response(b"ok");
        drop(req);

        assert_eq!(acks, b"ok");
    }

    #[test]
    fn one_shot_request_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Request<'static>>();
    }

    #[test]
    fn summary_omits_header_values() {
        let mut req = request();
        req.set_header("authorization", "secret").set_body("abc");
        let summary = req.summary();
        assert_eq!(summary.header_names, vec!["authorization"]);
        assert_eq!(summary.body_len, 3);
        assert!(!summary.streaming);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("secret"));
    }

    #[traced_test]
    #[test]
    fn construction_is_logged_with_request_id() {
        let req = request();
        assert!(logs_contain("request created"));
        assert!(logs_contain(&req.id().to_string()));
    }

    #[traced_test]
    #[test]
    fn header_values_are_not_logged() {
        let mut req = request();
        req.set_header("x-api-key", "hunter2");
        assert!(logs_contain("x-api-key"));
        assert!(!logs_contain("hunter2"));
    }
}
