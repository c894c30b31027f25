//! HTTP/1.1 wire codec: request serialization and response framing.
//!
//! # Design
//! Request construction is pure: it returns one contiguous buffer that the
//! engine hands to `Transport::write_bytes`. Response parsing is split into
//! small steps the engine drives in order (status line, header block,
//! framing choice), so each step can fail with its own error kind while the
//! engine keeps the state collected so far.

use std::fmt::Write as _;

use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::cancel::Cancellation;
use crate::error::RequestError;
use crate::http::{Headers, HttpMethod, RequestArgs};
use crate::target::Target;
use crate::transport::Transport;

/// Bytes left untouched by `url_encode`: ASCII alphanumerics and `-_.~`.
const URL_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Serialize the request line, headers and (for POST/PUT) the body.
pub fn build_request(method: HttpMethod, target: &Target, body: &[u8], args: &RequestArgs) -> Vec<u8> {
    let extra = &args.extra_headers;
    let mut head = String::with_capacity(256);

    // Writing into a String cannot fail.
    let _ = write!(head, "{method} {} HTTP/1.1\r\n", target.path);
    let _ = write!(head, "Host: {}\r\n", target.host_header);
    if args.options.compress {
        head.push_str("Accept-Encoding: gzip\r\n");
    }
    for (name, value) in extra.iter() {
        let _ = write!(head, "{name}: {value}\r\n");
    }
    if !extra.contains("Accept") {
        head.push_str("Accept: */*\r\n");
    }
    if !extra.contains("User-Agent") {
        let _ = write!(head, "User-Agent: {}\r\n", args.options.user_agent);
    }

    if !method.sends_body() {
        head.push_str("\r\n");
        return head.into_bytes();
    }

    let _ = write!(head, "Content-Length: {}\r\n", body.len());
    if !extra.contains("Content-Type") {
        let _ = write!(head, "Content-Type: {DEFAULT_CONTENT_TYPE}\r\n");
    }
    head.push_str("\r\n");

    let mut request = head.into_bytes();
    request.extend_from_slice(body);
    request
}

/// Extract the status code from `HTTP/1.1 <code> <reason>`.
pub fn parse_status_line(line: &str) -> Result<u16, RequestError> {
    let rest = line
        .strip_prefix("HTTP/1.1 ")
        .ok_or(RequestError::MissingStatus)?
        .trim_start();
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..digits_end]
        .parse()
        .map_err(|_| RequestError::MissingStatus)
}

/// Split `Name: value` at the first colon. Lines without a colon are not
/// headers and yield `None`.
pub fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    Some((name.trim(), value.trim()))
}

/// Read header lines up to the blank separator line into `headers`.
///
/// Headers parsed before a failed read stay in `headers`.
pub fn read_headers(
    transport: &mut dyn Transport,
    cancel: &Cancellation,
    headers: &mut Headers,
) -> Result<(), RequestError> {
    loop {
        let line = transport
            .read_line(cancel)
            .map_err(RequestError::HeaderParsingError)?;
        if line.is_empty() {
            return Ok(());
        }
        match parse_header_line(&line) {
            Some((name, value)) => headers.insert(name, value),
            None => tracing::debug!(line = %line, "ignoring malformed header line"),
        }
    }
}

/// How the response body is delimited. Exactly one applies per response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// HEAD responses: nothing is read.
    Skip,
    ContentLength(usize),
    Chunked,
    /// 204 without any other framing header.
    NoContent,
}

impl BodyFraming {
    /// Pick the framing by header presence, in priority order
    /// Content-Length, chunked Transfer-Encoding, 204.
    pub fn select(method: HttpMethod, status: u16, headers: &Headers) -> Result<Self, RequestError> {
        if method == HttpMethod::Head {
            return Ok(BodyFraming::Skip);
        }
        if let Some(length) = headers.find("Content-Length") {
            return length
                .trim()
                .parse()
                .map(BodyFraming::ContentLength)
                .map_err(|_| RequestError::CannotReadBody);
        }
        if headers.find("Transfer-Encoding").is_some_and(is_chunked) {
            return Ok(BodyFraming::Chunked);
        }
        if status == 204 {
            return Ok(BodyFraming::NoContent);
        }
        Err(RequestError::CannotReadBody)
    }
}

/// `chunked` must be the final transfer coding.
fn is_chunked(transfer_encoding: &str) -> bool {
    transfer_encoding
        .rsplit(',')
        .next()
        .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

/// Percent-encode every byte except ASCII alphanumerics and `-_.~`, using
/// uppercase hex digits.
pub fn url_encode(value: impl AsRef<[u8]>) -> String {
    percent_encode(value.as_ref(), URL_ENCODE_SET).to_string()
}

/// Inverse of `url_encode`. `+` is left as is; malformed escapes pass
/// through literally.
pub fn url_decode(value: &str) -> Vec<u8> {
    percent_decode_str(value).collect()
}

/// Encode parameters as `k1=v1&k2=v2`, preserving their order.
pub fn serialize_params<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    params
        .into_iter()
        .map(|(key, value)| format!("{}={}", url_encode(key), url_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}
