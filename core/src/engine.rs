//! Protocol engine: one logical call, including its redirect chain.
//!
//! # Design
//! `Engine::request` is the only synchronized entry point. It takes the
//! instance lock once and then runs `perform`, which recurses directly for
//! each redirect hop without touching the lock again. Each hop owns its
//! transport as a local value; the connection of a hop is closed before the
//! next hop opens its own.
//!
//! Every stage of a hop returns `Result<_, RequestError>`. The state
//! collected so far lives in an `Exchange`, so a failure at any stage still
//! reports the status code and headers that were already read.

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::cancel::{Cancellation, StopFlag};
use crate::chunked::read_chunked_body;
use crate::codec::{self, BodyFraming};
use crate::error::{HttpErrorCode, RequestError};
use crate::gzip::gzip_inflate;
use crate::http::{Headers, HttpMethod, HttpResponse, RequestArgs};
use crate::target::Target;
use crate::transport::Connector;

pub struct Engine {
    connector: Arc<dyn Connector>,
    stop: StopFlag,
    /// Serializes logical calls against this instance.
    lock: Mutex<()>,
}

/// What a hop asks the engine to do next.
enum Step {
    Complete,
    Redirect(String),
}

/// Response state accumulated while a hop progresses.
#[derive(Default)]
struct Exchange {
    status_code: u16,
    headers: Headers,
    body: Vec<u8>,
    upload_size: u64,
    download_size: u64,
}

impl Exchange {
    fn finish(self) -> HttpResponse {
        self.into_response(HttpErrorCode::Ok, String::new())
    }

    fn fail(self, err: RequestError) -> HttpResponse {
        self.into_response(err.code(), err.to_string())
    }

    fn into_response(self, error_code: HttpErrorCode, error_message: String) -> HttpResponse {
        HttpResponse {
            status_code: self.status_code,
            error_code,
            headers: self.headers,
            body: self.body,
            error_message,
            upload_size: self.upload_size,
            download_size: self.download_size,
        }
    }
}

impl Engine {
    pub fn new(connector: Arc<dyn Connector>, stop: StopFlag) -> Self {
        Self {
            connector,
            stop,
            lock: Mutex::new(()),
        }
    }

    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    /// Run one logical call to completion. Concurrent callers are served
    /// one at a time, each including its full redirect chain.
    pub fn request(&self, url: &str, method: HttpMethod, body: &[u8], args: &RequestArgs) -> HttpResponse {
        let _serialized = self.lock.lock();
        let request_id = Uuid::new_v4();
        self.perform(url, method, body, args, 0, request_id)
    }

    fn perform(
        &self,
        url: &str,
        method: HttpMethod,
        body: &[u8],
        args: &RequestArgs,
        redirects: u32,
        request_id: Uuid,
    ) -> HttpResponse {
        let span = tracing::debug_span!("http_request", %request_id, %method, url, hop = redirects);
        let _entered = span.enter();

        let mut exchange = Exchange::default();
        match self.exchange(url, method, body, args, redirects, &mut exchange) {
            Ok(Step::Complete) => {
                tracing::debug!(status = exchange.status_code, bytes = exchange.download_size, "request complete");
                exchange.finish()
            }
            Ok(Step::Redirect(location)) => {
                self.perform(&location, method, body, args, redirects + 1, request_id)
            }
            Err(err) => {
                tracing::warn!(code = ?err.code(), error = %err, "request failed");
                exchange.fail(err)
            }
        }
    }

    /// Drive a single hop: connect, send, then parse the response.
    fn exchange(
        &self,
        url: &str,
        method: HttpMethod,
        body: &[u8],
        args: &RequestArgs,
        redirects: u32,
        exchange: &mut Exchange,
    ) -> Result<Step, RequestError> {
        let target = Target::parse(url)?;
        let mut transport = self
            .connector
            .create(target.tls, &target.host, target.port)
            .map_err(RequestError::CannotCreateSocket)?;

        let connect_cancel = Cancellation::with_timeout(args.options.connect_timeout_ms, &self.stop);
        transport
            .connect(&target.host, target.port, &connect_cancel)
            .map_err(|reason| RequestError::CannotConnect {
                url: url.to_string(),
                reason,
            })?;
        tracing::debug!(host = %target.host, port = target.port, tls = target.tls, "connected");

        // The transfer budget starts now, independent of the connect phase.
        let cancel = Cancellation::with_timeout(args.options.transfer_timeout_ms, &self.stop);

        let request = codec::build_request(method, &target, body, args);
        if args.options.verbose {
            args.log(&format!(
                "Sending {method} request to {}:{}\nrequest size: {} bytes\n=============\n{}=============\n\n",
                target.host,
                target.port,
                request.len(),
                String::from_utf8_lossy(&request),
            ));
        }
        transport
            .write_bytes(&request, &cancel)
            .map_err(RequestError::SendError)?;
        exchange.upload_size = request.len() as u64;

        let status_line = transport
            .read_line(&cancel)
            .map_err(RequestError::CannotReadStatusLine)?;
        args.log(&format!("Status line {status_line}\n"));
        exchange.status_code = codec::parse_status_line(&status_line)?;
        tracing::debug!(status = exchange.status_code, "status line received");

        codec::read_headers(transport.as_mut(), &cancel, &mut exchange.headers)?;

        if (301..=308).contains(&exchange.status_code) && args.options.follow_redirects {
            let location = exchange
                .headers
                .find("Location")
                .ok_or(RequestError::MissingLocation)?;
            if redirects >= args.options.max_redirects {
                return Err(RequestError::TooManyRedirects(redirects));
            }
            let next = target.resolve(location)?;
            args.log(&format!("Redirecting to {next}\n"));
            tracing::debug!(location = %next, "following redirect");
            return Ok(Step::Redirect(next));
        }

        let framing = BodyFraming::select(method, exchange.status_code, &exchange.headers)?;
        tracing::debug!(?framing, "reading body");
        match framing {
            BodyFraming::Skip => return Ok(Step::Complete),
            BodyFraming::ContentLength(len) => {
                exchange.body = transport
                    .read_bytes(len, args.on_progress.as_ref(), &cancel)
                    .map_err(|e| RequestError::ChunkReadError(e.to_string()))?;
            }
            BodyFraming::Chunked => {
                read_chunked_body(transport.as_mut(), args, &cancel, &mut exchange.body)?;
            }
            BodyFraming::NoContent => {}
        }
        exchange.download_size = exchange.body.len() as u64;

        let gzipped = exchange
            .headers
            .find("Content-Encoding")
            .is_some_and(|encoding| encoding.trim().eq_ignore_ascii_case("gzip"));
        if gzipped {
            exchange.body = gzip_inflate(&exchange.body)?;
        }
        Ok(Step::Complete)
    }
}
