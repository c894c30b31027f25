//! Embeddable HTTP/1.1 client engine.
//!
//! # Overview
//! Given a URL, verb, body and options, the engine opens a connection,
//! writes one request and parses the response (status line, headers, body)
//! under separate connect and transfer deadlines. It follows redirects up
//! to a bound, decodes chunked bodies and inflates gzip payloads.
//!
//! # Design
//! - `HttpClient` is the public façade. Calls are synchronous by default;
//!   `HttpClient::new_async` adds a single worker that runs queued requests
//!   in FIFO order and reports through callbacks.
//! - Failures never surface as `Err`: every call yields an `HttpResponse`
//!   whose `error_code` says how far the exchange got.
//! - All network access goes through the `Transport`/`Connector` traits,
//!   so the protocol logic can be driven by in-memory scripts in tests.

pub mod cancel;
pub mod chunked;
pub mod client;
pub mod codec;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod gzip;
pub mod http;
pub mod target;
pub mod transport;

#[cfg(test)]
mod testing;

pub use cancel::{Cancellation, StopFlag};
pub use client::HttpClient;
pub use codec::{serialize_params, url_decode, url_encode};
pub use error::{HttpErrorCode, RequestError, TransportError};
pub use http::{Headers, HttpMethod, HttpResponse, LogCallback, ProgressCallback, RequestArgs, RequestOptions};
pub use transport::{Connector, DefaultConnector, SocketTransport, Transport};
