//! HTTP/1.1 test server covering every response shape the client parses:
//! fixed-length and chunked bodies, gzip, redirect chains, bare status
//! codes and slow responses.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::io::Write;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use flate2::{write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Payload of `/gzip` before compression.
pub const GZIP_PLAINTEXT: &str = "gzip payload: the quick brown fox jumps over the lazy dog";

/// Pieces streamed by `/chunked`, each as its own chunk.
pub const CHUNKED_PARTS: [&str; 3] = ["first chunk|", "second|", "third and last"];

/// Body of the final hop of a redirect chain.
pub const REDIRECT_DONE: &str = "redirect chain complete";

/// What `/get`, `/post` and `/put` report back about the request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub uri: String,
    /// Header names are lowercase.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Deterministic content of `/bytes/{n}`.
pub fn pattern_bytes(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i % 251) as u8).collect()
}

pub fn app() -> Router {
    Router::new()
        .route("/get", get(echo))
        .route("/post", post(echo))
        .route("/put", put(echo))
        .route("/delete", delete(no_content))
        .route("/status/{code}", get(status).post(status))
        .route("/bytes/{n}", get(bytes))
        .route("/chunked", get(chunked))
        .route("/gzip", get(gzip))
        .route("/redirect/{n}", get(redirect).post(redirect))
        .route("/absolute-redirect/{n}", get(absolute_redirect))
        .route("/no-location", get(no_location))
        .route("/delay/{ms}", get(delay))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        uri: uri.to_string(),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn status(Path(code): Path<u16>) -> Result<StatusCode, StatusCode> {
    StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)
}

async fn bytes(Path(n): Path<usize>) -> Vec<u8> {
    pattern_bytes(n)
}

async fn chunked() -> Response {
    let parts = CHUNKED_PARTS
        .iter()
        .map(|part| Ok::<_, Infallible>(Bytes::from_static(part.as_bytes())));
    (
        [(header::CONTENT_TYPE, "text/plain")],
        Body::from_stream(futures_util::stream::iter(parts)),
    )
        .into_response()
}

async fn gzip() -> Result<Response, StatusCode> {
    let compressed = gzip_encode(GZIP_PLAINTEXT.as_bytes()).map_err(|err| {
        tracing::error!(error = %err, "gzip encoding failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok((
        [
            (header::CONTENT_ENCODING, "gzip"),
            (header::CONTENT_TYPE, "text/plain"),
        ],
        compressed,
    )
        .into_response())
}

fn gzip_encode(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn redirect(Path(n): Path<u32>) -> Response {
    if n == 0 {
        return REDIRECT_DONE.into_response();
    }
    found(format!("/redirect/{}", n - 1))
}

async fn absolute_redirect(Path(n): Path<u32>, headers: HeaderMap) -> Response {
    if n == 0 {
        return REDIRECT_DONE.into_response();
    }
    let Some(host) = headers.get(header::HOST).and_then(|h| h.to_str().ok()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    found(format!("http://{host}/absolute-redirect/{}", n - 1))
}

async fn no_location() -> StatusCode {
    StatusCode::FOUND
}

async fn delay(Path(ms): Path<u64>) -> String {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    format!("delayed {ms} ms")
}
