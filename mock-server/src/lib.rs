use std::{collections::HashMap, sync::Arc};

use axum::{
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};

/// Bytes received per acknowledgement line on the fragment endpoint.
pub const ACK_INTERVAL: usize = 1024;

/// Header carrying the raw query string back to the caller of `/echo`.
pub const ECHO_QUERY_HEADER: &str = "x-echo-query";

/// Header naming the stream a fragment upload was appended to.
pub const FRAGMENT_STREAM_HEADER: &str = "x-fragment-stream";

/// One line of the fragment upload response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ack {
    /// Emitted each time another `ACK_INTERVAL` bytes have arrived.
    Progress { acked: usize, total: usize },
    /// Emitted once, after the whole body has been stored.
    Stored { stored: usize },
}

pub type Db = Arc<RwLock<HashMap<String, Vec<u8>>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/echo", post(echo))
        .route(
            "/fragments/{stream}",
            get(get_fragments).put(put_fragments).delete(delete_fragments),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Echo the body, the raw query, and every `x-*` request header.
async fn echo(RawQuery(query): RawQuery, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let mut echoed = HeaderMap::new();
    for (name, value) in &headers {
        if name.as_str().starts_with("x-") {
            echoed.insert(name.clone(), value.clone());
        }
    }
    if let Ok(value) = HeaderValue::from_str(query.as_deref().unwrap_or("")) {
        echoed.insert(HeaderName::from_static(ECHO_QUERY_HEADER), value);
    }
    tracing::info!(body_len = body.len(), "echo");
    (StatusCode::OK, echoed, body)
}

/// Append a streamed body to `stream`, acknowledging progress as it arrives.
async fn put_fragments(
    State(db): State<Db>,
    Path(stream): Path<String>,
    body: Body,
) -> Result<impl IntoResponse, StatusCode> {
    let mut body = body;
    let mut received = Vec::new();
    let mut lines = String::new();
    let mut acked = 0;

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|_| StatusCode::BAD_REQUEST)?;
        if let Ok(data) = frame.into_data() {
            received.extend_from_slice(&data);
            while received.len() / ACK_INTERVAL > acked {
                acked += 1;
                push_line(
                    &mut lines,
                    &Ack::Progress {
                        acked,
                        total: acked * ACK_INTERVAL,
                    },
                )?;
            }
        }
    }

    let stored = received.len();
    db.write()
        .await
        .entry(stream.clone())
        .or_default()
        .extend_from_slice(&received);
    push_line(&mut lines, &Ack::Stored { stored })?;
    tracing::info!(%stream, stored, "fragments stored");

    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&stream).map_err(|_| StatusCode::BAD_REQUEST)?;
    headers.insert(HeaderName::from_static(FRAGMENT_STREAM_HEADER), value);
    Ok((StatusCode::OK, headers, lines))
}

fn push_line(lines: &mut String, ack: &Ack) -> Result<(), StatusCode> {
    let line = serde_json::to_string(ack).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    lines.push_str(&line);
    lines.push('\n');
    Ok(())
}

async fn get_fragments(
    State(db): State<Db>,
    Path(stream): Path<String>,
) -> Result<Vec<u8>, StatusCode> {
    let streams = db.read().await;
    streams.get(&stream).cloned().ok_or(StatusCode::NOT_FOUND)
}

async fn delete_fragments(
    State(db): State<Db>,
    Path(stream): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let mut streams = db.write().await;
    streams
        .remove(&stream)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}
