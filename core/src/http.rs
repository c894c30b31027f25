//! Request and response data model.
//!
//! # Design
//! `RequestArgs` is built once per logical call and never mutated by the
//! engine; redirect hops only swap the effective URL, which travels as a
//! separate argument. `HttpResponse` is plain owned data so it can be handed
//! to callbacks on another thread or copied across the FFI boundary.
//!
//! The scalar knobs live in `RequestOptions`, which is serde-friendly so a
//! host can configure a request from a single JSON document.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::HttpErrorCode;

/// HTTP verb for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Delete,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }

    /// POST and PUT carry `Content-Length`, `Content-Type` and the body.
    pub fn sends_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered header list.
///
/// Keys keep the case they were inserted with. `insert` replaces the value
/// of an identical key in place (last write wins, first position kept);
/// `find` and `contains` compare names ASCII case-insensitively, which is
/// what response framing needs against servers that lowercase names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Exact-case lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive lookup; the most recently inserted spelling wins.
    pub fn find(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// Called with `(bytes_so_far, bytes_total)` while a body is read.
/// Returning `false` aborts the transfer.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) -> bool + Send + Sync>;

/// Sink for the verbose diagnostic dump.
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Scalar request configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// Connect-phase budget; zero or negative waits indefinitely.
    pub connect_timeout_ms: i64,
    /// Transfer-phase budget, counted from the end of the connect phase.
    pub transfer_timeout_ms: i64,
    pub follow_redirects: bool,
    pub max_redirects: u32,
    pub verbose: bool,
    /// Ask for a gzip-encoded response.
    pub compress: bool,
    pub user_agent: String,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 60_000,
            transfer_timeout_ms: 1_800_000,
            follow_redirects: true,
            max_redirects: 10,
            verbose: false,
            compress: false,
            user_agent: concat!("wirehttp/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl RequestOptions {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Everything needed to perform one logical call.
#[derive(Clone)]
pub struct RequestArgs {
    pub url: String,
    pub method: HttpMethod,
    pub body: Vec<u8>,
    pub extra_headers: Headers,
    pub options: RequestOptions,
    pub on_progress: Option<ProgressCallback>,
    pub logger: Option<LogCallback>,
}

impl RequestArgs {
    pub fn new(url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: url.into(),
            method,
            body: Vec::new(),
            extra_headers: Headers::new(),
            options: RequestOptions::default(),
            on_progress: None,
            logger: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64, u64) -> bool + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn logger<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.logger = Some(Arc::new(callback));
        self
    }

    /// Forward a diagnostic line to the caller's logger when verbose.
    pub(crate) fn log(&self, msg: &str) {
        if !self.options.verbose {
            return;
        }
        if let Some(logger) = &self.logger {
            logger(msg);
        }
    }
}

impl fmt::Debug for RequestArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestArgs")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("body_len", &self.body.len())
            .field("extra_headers", &self.extra_headers)
            .field("options", &self.options)
            .field("on_progress", &self.on_progress.is_some())
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

/// Terminal outcome of a logical call.
///
/// `status_code` is 0 when no status line was obtained. On failure the
/// status and headers collected before the failing step are kept, and
/// `body` holds whatever was read (still compressed for `Gzip` errors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub error_code: HttpErrorCode,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub error_message: String,
    pub upload_size: u64,
    pub download_size: u64,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.error_code == HttpErrorCode::Ok
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
