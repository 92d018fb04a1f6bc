//! Execute descriptors against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then plays the transport role
//! with ureq: it reads each `Request` once, sends it, and for streaming
//! requests pulls the body from the read callback and pushes response
//! headers and body through the header and write callbacks. Validates that
//! the descriptor carries everything a real transport needs.

use std::collections::VecDeque;
use std::time::Duration;

use mock_server::{Ack, ACK_INTERVAL};
use request_core::{Request, StreamCallbacks, Verb};

/// What the transport observed. `body` stays empty for streaming requests,
/// whose response goes through the write callback instead.
struct Executed {
    status: u16,
    header_lines: Vec<String>,
    body: Vec<u8>,
}

fn agent_for(req: &Request<'_>) -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(req.configured_request_completion_timeout())
        .timeout_connect(req.configured_connection_timeout())
        .build()
        .new_agent()
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send(
    agent: &ureq::Agent,
    verb: Verb,
    url: &str,
    headers: &[(String, String)],
    body: impl ureq::AsSendBody,
) -> ureq::http::Response<ureq::Body> {
    let result = match verb {
        Verb::Get => with_headers(agent.get(url), headers).call(),
        Verb::Head => with_headers(agent.head(url), headers).call(),
        Verb::Delete => with_headers(agent.delete(url), headers).call(),
        Verb::Post => with_headers(agent.post(url), headers).send(body),
        Verb::Put => with_headers(agent.put(url), headers).send(body),
        Verb::Patch => with_headers(agent.patch(url), headers).send(body),
        Verb::Options => panic!("OPTIONS is not exercised against the mock server"),
    };
    result.expect("HTTP transport error")
}

/// Render a response header as the raw line the header callback receives.
fn header_line(name: &ureq::http::HeaderName, value: &ureq::http::HeaderValue) -> String {
    format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes()))
}

/// Execute one attempt of `req` using ureq.
fn execute(req: &mut Request<'_>) -> Executed {
    let agent = agent_for(req);
    let verb = req.verb();
    let url = req.url().to_string();
    let headers: Vec<(String, String)> = req
        .headers()
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    let mut response = match req.stream_callbacks_mut() {
        Some(stream) => {
            let mut reader = stream.body_reader();
            send(&agent, verb, &url, &headers, ureq::SendBody::from_reader(&mut reader))
        }
        None => send(&agent, verb, &url, &headers, req.body()),
    };

    let status = response.status().as_u16();
    let header_lines: Vec<String> = response
        .headers()
        .iter()
        .map(|(name, value)| header_line(name, value))
        .collect();

    match req.stream_callbacks_mut() {
        Some(stream) => {
            for line in &header_lines {
                stream.on_header(line);
            }
            let mut body = response.body_mut().as_reader();
            std::io::copy(&mut body, &mut stream.response_writer()).expect("response body");
            Executed {
                status,
                header_lines,
                body: Vec::new(),
            }
        }
        None => {
            let body = response.body_mut().read_to_vec().expect("response body");
            Executed {
                status,
                header_lines,
                body,
            }
        }
    }
}

/// Start the mock server on a random port and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

/// Media fragments handed to the transport one read at a time.
struct FragmentSource {
    fragments: VecDeque<Vec<u8>>,
    pending: Vec<u8>,
    reads: usize,
}

impl FragmentSource {
    fn new(fragments: Vec<Vec<u8>>) -> Self {
        Self {
            fragments: fragments.into(),
            pending: Vec::new(),
            reads: 0,
        }
    }

    fn fill(&mut self, buf: &mut [u8]) -> usize {
        self.reads += 1;
        if self.pending.is_empty() {
            match self.fragments.pop_front() {
                Some(fragment) => self.pending = fragment,
                None => return 0,
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        n
    }
}

fn parse_acks(body: &[u8]) -> Vec<Ack> {
    std::str::from_utf8(body)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn non_utf8_header_values_are_converted_lossily() {
    let name = ureq::http::HeaderName::from_static("x-camera");
    let value = ureq::http::HeaderValue::from_bytes(b"caf\xe9").unwrap();
    assert_eq!(header_line(&name, &value), "x-camera: caf\u{fffd}");
}

#[test]
fn one_shot_post_round_trip() {
    let base = start_server();

    let mut req = Request::new(Verb::Post, format!("{base}/echo?stream=cam1"));
    req.set_header("x-producer", "request-core")
        .set_body("first")
        .set_body("hello")
        .set_connection_timeout(Duration::from_secs(5))
        .set_request_completion_timeout(Duration::from_secs(10));
    assert_eq!(req.path().unwrap(), "/echo");
    assert_eq!(req.query(), "stream=cam1");

    let executed = execute(&mut req);
    assert_eq!(executed.status, 200);
    assert_eq!(executed.body, b"hello");
    assert!(executed
        .header_lines
        .contains(&"x-echo-query: stream=cam1".to_string()));
    assert!(executed
        .header_lines
        .contains(&"x-producer: request-core".to_string()));
}

#[test]
fn streaming_put_delivers_every_fragment() {
    let base = start_server();

    let fragments: Vec<Vec<u8>> = (0..5u8).map(|i| vec![i; 700]).collect();
    let expected: Vec<u8> = fragments.concat();

    let mut source = FragmentSource::new(fragments);
    let mut acks: Vec<u8> = Vec::new();
    let mut header_lines: Vec<String> = Vec::new();

    let callbacks = StreamCallbacks::new(&mut source, FragmentSource::fill)
        .with_header_callback(|line| header_lines.push(line.to_string()))
        .with_write_callback(&mut acks, |acks: &mut Vec<u8>, chunk| {
            acks.extend_from_slice(chunk)
        });

    let mut req = Request::streaming(Verb::Put, format!("{base}/fragments/cam1"), callbacks);
    req.set_header("content-type", "video/h264");
    assert!(req.is_streaming());

    let executed = execute(&mut req);
    assert_eq!(executed.status, 200);
    assert!(executed.body.is_empty());
    drop(req);

    assert!(source.fragments.is_empty());
    assert!(source.reads > 5, "read callback polled until end of body");
    assert!(header_lines.contains(&"x-fragment-stream: cam1".to_string()));

    let acks = parse_acks(&acks);
    let progress = acks
        .iter()
        .filter(|ack| matches!(ack, Ack::Progress { .. }))
        .count();
    assert_eq!(progress, expected.len() / ACK_INTERVAL);
    assert_eq!(
        acks.last(),
        Some(&Ack::Stored {
            stored: expected.len()
        })
    );

    // The stored stream matches what the read callback produced.
    let mut get = Request::new(Verb::Get, format!("{base}/fragments/cam1"));
    let executed = execute(&mut get);
    assert_eq!(executed.status, 200);
    assert_eq!(executed.body, expected);
}

#[test]
fn streaming_without_write_callback_discards_response() {
    let base = start_server();

    let mut source = FragmentSource::new(vec![b"tiny".to_vec()]);
    let callbacks = StreamCallbacks::new(&mut source, FragmentSource::fill);

    let mut req = Request::streaming(Verb::Put, format!("{base}/fragments/cam2"), callbacks);
    let executed = execute(&mut req);
    assert_eq!(executed.status, 200);
    drop(req);

    let mut get = Request::new(Verb::Get, format!("{base}/fragments/cam2"));
    assert_eq!(execute(&mut get).body, b"tiny");
}

#[test]
fn delete_then_get_reports_not_found() {
    let base = start_server();

    let mut put = Request::new(Verb::Put, format!("{base}/fragments/cam3"));
    put.set_body(vec![1u8, 2, 3]);
    assert_eq!(execute(&mut put).status, 200);

    let mut delete = Request::new(Verb::Delete, format!("{base}/fragments/cam3"));
    assert_eq!(execute(&mut delete).status, 204);

    // The transport leaves status interpretation to the caller.
    let mut get = Request::new(Verb::Get, format!("{base}/fragments/cam3"));
    assert_eq!(execute(&mut get).status, 404);
}
