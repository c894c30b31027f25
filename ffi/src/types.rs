//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Clients and requests are opaque handles; C only ever holds pointers to
//! them. Responses are plain data: every string is a NUL-terminated
//! `*mut c_char`, the body is a `(ptr, len)` byte buffer since it may hold
//! NULs, and headers are a `(ptr, len)` array of `FfiHeader`. Conversion
//! and release helpers live here to keep `lib.rs` focused on the
//! `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use wirehttp_core::{HttpClient, HttpErrorCode, HttpMethod, HttpResponse, RequestArgs};

/// Opaque handle to an `HttpClient`.
pub struct FfiHttpClient {
    pub(crate) inner: HttpClient,
}

/// Opaque handle to the arguments of one request.
pub struct FfiRequestArgs {
    pub(crate) inner: RequestArgs,
}

/// HTTP verb as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Head = 1,
    Delete = 2,
    Post = 3,
    Put = 4,
}

impl From<FfiHttpMethod> for HttpMethod {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => HttpMethod::Get,
            FfiHttpMethod::Head => HttpMethod::Head,
            FfiHttpMethod::Delete => HttpMethod::Delete,
            FfiHttpMethod::Post => HttpMethod::Post,
            FfiHttpMethod::Put => HttpMethod::Put,
        }
    }
}

/// Outcome codes. The first block mirrors the engine's error taxonomy;
/// the last three are produced by the FFI layer itself.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    UrlMalformed = 1,
    CannotCreateSocket = 2,
    CannotConnect = 3,
    SendError = 4,
    CannotReadStatusLine = 5,
    MissingStatus = 6,
    HeaderParsingError = 7,
    MissingLocation = 8,
    TooManyRedirects = 9,
    ChunkReadError = 10,
    CannotReadBody = 11,
    Gzip = 12,
    NullArg = 13,
    InvalidArg = 14,
    Panic = 15,
}

impl From<HttpErrorCode> for FfiErrorCode {
    fn from(code: HttpErrorCode) -> Self {
        match code {
            HttpErrorCode::Ok => FfiErrorCode::Ok,
            HttpErrorCode::UrlMalformed => FfiErrorCode::UrlMalformed,
            HttpErrorCode::CannotCreateSocket => FfiErrorCode::CannotCreateSocket,
            HttpErrorCode::CannotConnect => FfiErrorCode::CannotConnect,
            HttpErrorCode::SendError => FfiErrorCode::SendError,
            HttpErrorCode::CannotReadStatusLine => FfiErrorCode::CannotReadStatusLine,
            HttpErrorCode::MissingStatus => FfiErrorCode::MissingStatus,
            HttpErrorCode::HeaderParsingError => FfiErrorCode::HeaderParsingError,
            HttpErrorCode::MissingLocation => FfiErrorCode::MissingLocation,
            HttpErrorCode::TooManyRedirects => FfiErrorCode::TooManyRedirects,
            HttpErrorCode::ChunkReadError => FfiErrorCode::ChunkReadError,
            HttpErrorCode::CannotReadBody => FfiErrorCode::CannotReadBody,
            HttpErrorCode::Gzip => FfiErrorCode::Gzip,
        }
    }
}

/// A single response header as a pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// Terminal outcome of a request, owned by the C caller.
///
/// `error_message` is null when `error_code` is `Ok`. `body` is null when
/// `body_len` is zero. Release with `wh_free_response`.
#[repr(C)]
pub struct FfiHttpResponse {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub status_code: u16,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut u8,
    pub body_len: usize,
    pub upload_size: u64,
    pub download_size: u64,
}

impl FfiHttpResponse {
    pub(crate) fn from_core(resp: HttpResponse) -> *mut Self {
        let error_message = if resp.is_ok() {
            std::ptr::null_mut()
        } else {
            c_string(resp.error_message)
        };

        let headers: Vec<FfiHeader> = resp
            .headers
            .iter()
            .map(|(k, v)| FfiHeader {
                key: c_string(k),
                value: c_string(v),
            })
            .collect();
        let headers_len = headers.len() as u32;
        let (body, body_len) = into_raw_slice(resp.body);

        Box::into_raw(Box::new(FfiHttpResponse {
            error_code: resp.error_code.into(),
            error_message,
            status_code: resp.status_code,
            headers: into_raw_slice(headers).0,
            headers_len,
            body,
            body_len,
            upload_size: resp.upload_size,
            download_size: resp.download_size,
        }))
    }

    /// A response for failures that happen before the engine runs.
    pub(crate) fn failure(error_code: FfiErrorCode, msg: &str) -> *mut Self {
        Box::into_raw(Box::new(FfiHttpResponse {
            error_code,
            error_message: c_string(msg),
            status_code: 0,
            headers: std::ptr::null_mut(),
            headers_len: 0,
            body: std::ptr::null_mut(),
            body_len: 0,
            upload_size: 0,
            download_size: 0,
        }))
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NullArg, &format!("null argument: {name}"))
    }

    /// Release everything `from_core` or `failure` allocated.
    ///
    /// # Safety
    /// `resp` must come from one of those constructors and not be freed yet.
    pub(crate) unsafe fn release(resp: *mut Self) {
        let resp = unsafe { Box::from_raw(resp) };
        free_c_string(resp.error_message);
        let headers = unsafe { from_raw_slice(resp.headers, resp.headers_len as usize) };
        for header in headers.iter() {
            free_c_string(header.key);
            free_c_string(header.value);
        }
        drop(unsafe { from_raw_slice(resp.body, resp.body_len) });
    }
}

/// Copy `s` into a C string, dropping interior NUL bytes.
pub(crate) fn c_string(s: impl Into<String>) -> *mut c_char {
    let bytes: Vec<u8> = s.into().into_bytes().into_iter().filter(|b| *b != 0).collect();
    CString::new(bytes).unwrap_or_default().into_raw()
}

pub(crate) fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Leak `items` as a boxed slice; empty input yields a null pointer.
fn into_raw_slice<T>(items: Vec<T>) -> (*mut T, usize) {
    if items.is_empty() {
        return (std::ptr::null_mut(), 0);
    }
    let len = items.len();
    (Box::into_raw(items.into_boxed_slice()).cast::<T>(), len)
}

/// Inverse of `into_raw_slice`.
///
/// # Safety
/// `(ptr, len)` must come from `into_raw_slice` and not be reclaimed yet.
unsafe fn from_raw_slice<T>(ptr: *mut T, len: usize) -> Box<[T]> {
    if ptr.is_null() || len == 0 {
        return Box::new([]);
    }
    unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len)) }
}
