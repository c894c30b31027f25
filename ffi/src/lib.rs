//! C-ABI wrapper around `wirehttp-core`.
//!
//! # Overview
//! Exposes the HTTP client through `extern "C"` functions so any language
//! with a C FFI can issue requests, synchronously or through the client's
//! worker thread, without linking against Rust types.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Clients and requests are opaque handles built and configured through
//!   setters; scalar options are set in one call from a JSON document.
//! - Every request yields an `FfiHttpResponse`, even for null arguments or
//!   caught panics, so C callers have a single result shape to inspect.
//! - The C caller owns all returned pointers and must call the matching
//!   `wh_free_*` / `wh_*_free` function to release them.

pub mod types;

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use wirehttp_core::{HttpClient, RequestArgs, RequestOptions};

use types::*;

/// Receives ownership of the response; free it with `wh_free_response`.
pub type FfiResponseCallback = extern "C" fn(response: *mut FfiHttpResponse, user_data: *mut c_void);

/// Borrow a C string as UTF-8. Invalid UTF-8 is rejected.
fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client. With `async_mode` the client owns one worker thread
/// that runs `wh_client_perform_async` requests in FIFO order.
///
/// Returns null if an internal panic occurs.
/// The caller must free the returned pointer with `wh_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn wh_client_new(async_mode: bool) -> *mut FfiHttpClient {
    catch_unwind(|| {
        let inner = if async_mode {
            HttpClient::new_async()
        } else {
            HttpClient::new()
        };
        Box::into_raw(Box::new(FfiHttpClient { inner }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `wh_client_new`. Safe to call with null.
///
/// Blocks until the worker thread has stopped. Async requests that have not
/// started yet are discarded and their callbacks never run.
#[unsafe(no_mangle)]
pub extern "C" fn wh_client_free(client: *mut FfiHttpClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(client) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Request construction
// ---------------------------------------------------------------------------

/// Create request arguments for `url` with default options.
///
/// Returns null if `url` is null or not UTF-8.
/// The caller must free the returned pointer with `wh_request_free`.
#[unsafe(no_mangle)]
pub extern "C" fn wh_request_new(url: *const c_char, method: FfiHttpMethod) -> *mut FfiRequestArgs {
    catch_unwind(|| {
        let Some(url) = str_arg(url) else {
            return std::ptr::null_mut();
        };
        let inner = RequestArgs::new(url, method.into());
        Box::into_raw(Box::new(FfiRequestArgs { inner }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Replace the scalar options from a JSON object, e.g.
/// `{"connect_timeout_ms":5000,"compress":true}`. Missing fields take
/// their defaults.
#[unsafe(no_mangle)]
pub extern "C" fn wh_request_set_options_json(req: *mut FfiRequestArgs, json: *const c_char) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if req.is_null() || json.is_null() {
            return FfiErrorCode::NullArg;
        }
        let Some(json) = str_arg(json) else {
            return FfiErrorCode::InvalidArg;
        };
        match RequestOptions::from_json(json) {
            Ok(options) => {
                unsafe { &mut *req }.inner.options = options;
                FfiErrorCode::Ok
            }
            Err(err) => {
                tracing::debug!(error = %err, "rejecting request options");
                FfiErrorCode::InvalidArg
            }
        }
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Add (or replace) an extra request header.
#[unsafe(no_mangle)]
pub extern "C" fn wh_request_add_header(
    req: *mut FfiRequestArgs,
    name: *const c_char,
    value: *const c_char,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if req.is_null() || name.is_null() || value.is_null() {
            return FfiErrorCode::NullArg;
        }
        let (Some(name), Some(value)) = (str_arg(name), str_arg(value)) else {
            return FfiErrorCode::InvalidArg;
        };
        unsafe { &mut *req }.inner.extra_headers.insert(name, value);
        FfiErrorCode::Ok
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Copy `len` bytes from `data` into the request body. `data` may be null
/// only when `len` is zero.
#[unsafe(no_mangle)]
pub extern "C" fn wh_request_set_body(req: *mut FfiRequestArgs, data: *const u8, len: usize) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if req.is_null() || (data.is_null() && len > 0) {
            return FfiErrorCode::NullArg;
        }
        let body = if len == 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(data, len) }.to_vec()
        };
        unsafe { &mut *req }.inner.body = body;
        FfiErrorCode::Ok
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Free request arguments created by `wh_request_new`. Safe to call with
/// null.
#[unsafe(no_mangle)]
pub extern "C" fn wh_request_free(req: *mut FfiRequestArgs) {
    if !req.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(req) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run the request on the calling thread and return its outcome.
///
/// Never returns null. `req` stays owned by the caller.
/// The caller must free the returned pointer with `wh_free_response`.
#[unsafe(no_mangle)]
pub extern "C" fn wh_client_perform(
    client: *const FfiHttpClient,
    req: *const FfiRequestArgs,
) -> *mut FfiHttpResponse {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiHttpResponse::null_arg("client");
        }
        if req.is_null() {
            return FfiHttpResponse::null_arg("req");
        }
        let client = unsafe { &*client };
        let req = unsafe { &*req };
        FfiHttpResponse::from_core(client.inner.request(&req.inner))
    }))
    .unwrap_or_else(|_| FfiHttpResponse::failure(FfiErrorCode::Panic, "panic in wh_client_perform"))
}

/// Opaque callback context handed back to C on the worker thread.
struct UserData(*mut c_void);

// The pointer is only passed back to the caller's callback, never read.
unsafe impl Send for UserData {}

impl UserData {
    fn into_inner(self) -> *mut c_void {
        self.0
    }
}

/// Queue the request on the client's worker thread.
///
/// Returns false, without queuing, when the client is synchronous-only or
/// an argument is null. `callback` runs on the worker thread and takes
/// ownership of the response. `req` is copied and stays owned by the
/// caller.
#[unsafe(no_mangle)]
pub extern "C" fn wh_client_perform_async(
    client: *const FfiHttpClient,
    req: *const FfiRequestArgs,
    callback: Option<FfiResponseCallback>,
    user_data: *mut c_void,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(callback) = callback else {
            return false;
        };
        if client.is_null() || req.is_null() {
            return false;
        }
        let client = unsafe { &*client };
        let args = unsafe { &*req }.inner.clone();
        let user_data = UserData(user_data);
        client.inner.perform_request(args, move |response| {
            callback(FfiHttpResponse::from_core(response), user_data.into_inner());
        })
    }))
    .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

/// Percent-encode `value`, keeping only ASCII alphanumerics and `-_.~`.
///
/// Returns null if `value` is null. Free with `wh_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn wh_url_encode(value: *const c_char) -> *mut c_char {
    catch_unwind(|| {
        if value.is_null() {
            return std::ptr::null_mut();
        }
        let bytes = unsafe { CStr::from_ptr(value) }.to_bytes();
        c_string(wirehttp_core::url_encode(bytes))
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a response returned by `wh_client_perform` or handed to an async
/// callback. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn wh_free_response(resp: *mut FfiHttpResponse) {
    if resp.is_null() {
        return;
    }
    let _ = catch_unwind(|| unsafe { FfiHttpResponse::release(resp) });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn wh_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| free_c_string(s));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
