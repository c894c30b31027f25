//! Error taxonomy for the HTTP engine.
//!
//! # Design
//! Failures never cross the public API as `Err`. Internally every stage
//! returns `Result<_, RequestError>` and the engine folds the error into an
//! `HttpResponse` together with whatever status and headers were collected
//! before the failure. `HttpErrorCode` is the flat, C-friendly projection of
//! `RequestError` that callers (and the FFI layer) switch on.

use serde::Serialize;
use thiserror::Error;

/// Outcome code carried by every `HttpResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HttpErrorCode {
    Ok,
    UrlMalformed,
    CannotCreateSocket,
    CannotConnect,
    SendError,
    CannotReadStatusLine,
    MissingStatus,
    HeaderParsingError,
    MissingLocation,
    TooManyRedirects,
    ChunkReadError,
    CannotReadBody,
    Gzip,
}

/// A terminal failure of one request hop.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Cannot parse url: {0}")]
    UrlMalformed(String),

    #[error("Cannot create socket: {0}")]
    CannotCreateSocket(String),

    #[error("Cannot connect to url: {url} / error : {reason}")]
    CannotConnect { url: String, reason: TransportError },

    #[error("Cannot send request: {0}")]
    SendError(TransportError),

    #[error("Cannot retrieve status line: {0}")]
    CannotReadStatusLine(TransportError),

    #[error("Cannot parse response code from status line")]
    MissingStatus,

    #[error("Cannot parse http headers: {0}")]
    HeaderParsingError(TransportError),

    #[error("Missing location header for redirect")]
    MissingLocation,

    #[error("Too many redirects: {0}")]
    TooManyRedirects(u32),

    #[error("Cannot read chunk: {0}")]
    ChunkReadError(String),

    #[error("Cannot read http body")]
    CannotReadBody,

    #[error("Error decompressing payload: {0}")]
    Gzip(String),
}

impl RequestError {
    pub fn code(&self) -> HttpErrorCode {
        match self {
            RequestError::UrlMalformed(_) => HttpErrorCode::UrlMalformed,
            RequestError::CannotCreateSocket(_) => HttpErrorCode::CannotCreateSocket,
            RequestError::CannotConnect { .. } => HttpErrorCode::CannotConnect,
            RequestError::SendError(_) => HttpErrorCode::SendError,
            RequestError::CannotReadStatusLine(_) => HttpErrorCode::CannotReadStatusLine,
            RequestError::MissingStatus => HttpErrorCode::MissingStatus,
            RequestError::HeaderParsingError(_) => HttpErrorCode::HeaderParsingError,
            RequestError::MissingLocation => HttpErrorCode::MissingLocation,
            RequestError::TooManyRedirects(_) => HttpErrorCode::TooManyRedirects,
            RequestError::ChunkReadError(_) => HttpErrorCode::ChunkReadError,
            RequestError::CannotReadBody => HttpErrorCode::CannotReadBody,
            RequestError::Gzip(_) => HttpErrorCode::Gzip,
        }
    }
}

/// Failure of a single transport primitive.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("connection closed by peer")]
    Closed,

    /// The progress callback asked to stop the transfer.
    #[error("transfer aborted by progress callback")]
    Aborted,

    #[error("line longer than {0} bytes")]
    LineTooLong(usize),

    #[error("socket is not connected")]
    NotConnected,

    #[error("cannot resolve {0}")]
    Resolve(String),

    #[error("invalid TLS server name: {0}")]
    InvalidServerName(String),

    #[error("tls: {0}")]
    Tls(#[from] rustls::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
