//! Public entry point: synchronous calls plus the optional async queue.
//!
//! # Design
//! `HttpClient` owns an `Engine` behind an `Arc` and, in async mode, the
//! `Dispatcher` whose worker shares that engine. Every verb helper funnels
//! into `Engine::request`, so sync calls and queued calls against one client
//! are serialized by the same lock.
//!
//! # Shutdown
//! Dropping an async client stops its worker. Requests that are still
//! queued at that point are discarded: they never execute and their
//! callbacks are never invoked. A request already executing sees the stop
//! and usually fails fast with a transport error. Callers that need every
//! queued response must wait for their callbacks before dropping the client.

use std::sync::Arc;

use crate::cancel::StopFlag;
use crate::codec::serialize_params;
use crate::dispatch::Dispatcher;
use crate::engine::Engine;
use crate::http::{HttpMethod, HttpResponse, RequestArgs};
use crate::transport::{Connector, DefaultConnector};

pub struct HttpClient {
    engine: Arc<Engine>,
    dispatcher: Option<Dispatcher>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Synchronous-only client: `perform_request` always returns `false`.
    pub fn new() -> Self {
        Self::with_connector(Arc::new(DefaultConnector::new()), false)
    }

    /// Client with a dedicated worker thread for `perform_request`.
    pub fn new_async() -> Self {
        Self::with_connector(Arc::new(DefaultConnector::new()), true)
    }

    /// Build a client over a custom transport factory.
    ///
    /// If the worker thread cannot be spawned the client falls back to
    /// synchronous-only mode.
    pub fn with_connector(connector: Arc<dyn Connector>, async_mode: bool) -> Self {
        let stop = StopFlag::new();
        let engine = Arc::new(Engine::new(connector, stop.clone()));
        let dispatcher = if async_mode {
            match Dispatcher::spawn(Arc::clone(&engine), stop) {
                Ok(dispatcher) => Some(dispatcher),
                Err(err) => {
                    tracing::error!(error = %err, "cannot spawn worker thread, running synchronously");
                    None
                }
            }
        } else {
            None
        };
        Self { engine, dispatcher }
    }

    pub fn is_async(&self) -> bool {
        self.dispatcher.is_some()
    }

    /// Fresh request arguments with default options.
    pub fn create_request(&self, url: impl Into<String>, method: HttpMethod) -> RequestArgs {
        RequestArgs::new(url, method)
    }

    /// Perform `args` as described by its own url, method and body.
    pub fn request(&self, args: &RequestArgs) -> HttpResponse {
        self.engine.request(&args.url, args.method, &args.body, args)
    }

    pub fn get(&self, url: &str, args: &RequestArgs) -> HttpResponse {
        self.engine.request(url, HttpMethod::Get, &[], args)
    }

    pub fn head(&self, url: &str, args: &RequestArgs) -> HttpResponse {
        self.engine.request(url, HttpMethod::Head, &[], args)
    }

    pub fn del(&self, url: &str, args: &RequestArgs) -> HttpResponse {
        self.engine.request(url, HttpMethod::Delete, &[], args)
    }

    pub fn post(&self, url: &str, body: impl AsRef<[u8]>, args: &RequestArgs) -> HttpResponse {
        self.engine.request(url, HttpMethod::Post, body.as_ref(), args)
    }

    /// POST `params` as an url-encoded form, in iteration order.
    pub fn post_params<I, K, V>(&self, url: &str, params: I, args: &RequestArgs) -> HttpResponse
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        self.post(url, serialize_params(params), args)
    }

    pub fn put(&self, url: &str, body: impl AsRef<[u8]>, args: &RequestArgs) -> HttpResponse {
        self.engine.request(url, HttpMethod::Put, body.as_ref(), args)
    }

    pub fn put_params<I, K, V>(&self, url: &str, params: I, args: &RequestArgs) -> HttpResponse
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        self.put(url, serialize_params(params), args)
    }

    /// Queue `args` on the worker; `on_response` runs on the worker thread.
    ///
    /// Returns `false` without queuing in synchronous-only mode. See the
    /// module docs for what happens to queued requests on drop.
    pub fn perform_request<F>(&self, args: RequestArgs, on_response: F) -> bool
    where
        F: FnOnce(HttpResponse) + Send + 'static,
    {
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.enqueue(args, Box::new(on_response)),
            None => false,
        }
    }
}
