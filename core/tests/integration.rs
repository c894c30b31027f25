//! End-to-end tests over real TCP.
//!
//! # Design
//! Most tests run against the mock server started on a random port in a
//! background tokio runtime. Responses axum cannot produce (wrong protocol
//! version, truncated bodies, broken chunk sizes) come from one-shot raw
//! `TcpListener` servers instead. `ureq` serves as a reference client where
//! the decoded body can be cross-checked.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex, Once};
use std::thread;
use std::time::{Duration, Instant};

use mock_server::{pattern_bytes, Echo, CHUNKED_PARTS, GZIP_PLAINTEXT, REDIRECT_DONE};
use tracing_subscriber::EnvFilter;
use wirehttp_core::{HttpClient, HttpErrorCode, HttpMethod, HttpResponse, RequestArgs};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Start the mock server on a random port and return its base URL.
fn start_server() -> String {
    init_tracing();
    let std_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

/// Accept one connection, consume the request head, answer with `response`
/// and close.
fn raw_server(response: &'static [u8]) -> String {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket.write_all(response).unwrap();
    });
    format!("http://{addr}/")
}

fn get(url: &str) -> HttpResponse {
    let client = HttpClient::new();
    let args = client.create_request(url, HttpMethod::Get);
    client.get(url, &args)
}

fn echo(response: &HttpResponse) -> Echo {
    serde_json::from_slice(&response.body).unwrap()
}

// --- verbs ---

#[test]
fn get_sends_default_headers() {
    let base = start_server();
    let client = HttpClient::new();
    let url = format!("{base}/get?name=a%20b");
    let args = client
        .create_request(&url, HttpMethod::Get)
        .header("X-Custom", "yes");

    let response = client.get(&url, &args);
    assert!(response.is_ok(), "{}", response.error_message);
    assert_eq!(response.status_code, 200);
    assert_eq!(response.download_size, response.body.len() as u64);

    let echo = echo(&response);
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.uri, "/get?name=a%20b");
    assert_eq!(echo.headers["host"], base.trim_start_matches("http://"));
    assert_eq!(echo.headers["accept"], "*/*");
    assert_eq!(echo.headers["x-custom"], "yes");
    assert!(echo.headers["user-agent"].starts_with("wirehttp/"));
}

#[test]
fn post_params_are_form_encoded() {
    let base = start_server();
    let client = HttpClient::new();
    let url = format!("{base}/post");
    let args = client.create_request(&url, HttpMethod::Post);

    let response = client.post_params(&url, [("name", "Jane Doe"), ("q", "a&b")], &args);
    assert!(response.is_ok(), "{}", response.error_message);

    let echo = echo(&response);
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.body, "name=Jane%20Doe&q=a%26b");
    assert_eq!(echo.headers["content-type"], "application/x-www-form-urlencoded");
    assert_eq!(echo.headers["content-length"], "23");
}

#[test]
fn put_keeps_caller_content_type() {
    let base = start_server();
    let client = HttpClient::new();
    let url = format!("{base}/put");
    let args = client
        .create_request(&url, HttpMethod::Put)
        .header("Content-Type", "application/json");

    let response = client.put(&url, r#"{"k":1}"#, &args);
    assert!(response.is_ok(), "{}", response.error_message);

    let echo = echo(&response);
    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.body, r#"{"k":1}"#);
    assert_eq!(echo.headers["content-type"], "application/json");
}

#[test]
fn delete_with_no_content() {
    let base = start_server();
    let client = HttpClient::new();
    let url = format!("{base}/delete");
    let args = client.create_request(&url, HttpMethod::Delete);

    let response = client.del(&url, &args);
    assert!(response.is_ok(), "{}", response.error_message);
    assert_eq!(response.status_code, 204);
    assert!(response.body.is_empty());
}

#[test]
fn head_reads_headers_only() {
    let base = start_server();
    let client = HttpClient::new();
    let url = format!("{base}/bytes/4096");
    let args = client.create_request(&url, HttpMethod::Head);

    let response = client.head(&url, &args);
    assert!(response.is_ok(), "{}", response.error_message);
    assert_eq!(response.status_code, 200);
    assert!(response.body.is_empty());
    assert_eq!(response.download_size, 0);
}

#[test]
fn status_codes_are_not_errors() {
    let base = start_server();
    for code in [404u16, 500] {
        let response = get(&format!("{base}/status/{code}"));
        assert_eq!(response.error_code, HttpErrorCode::Ok);
        assert_eq!(response.status_code, code);
    }
}

// --- bodies ---

#[test]
fn large_body_reports_progress() {
    let base = start_server();
    let client = HttpClient::new();
    let url = format!("{base}/bytes/100000");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let args = client
        .create_request(&url, HttpMethod::Get)
        .on_progress(move |so_far, total| {
            sink.lock().unwrap().push((so_far, total));
            true
        });

    let response = client.get(&url, &args);
    assert!(response.is_ok(), "{}", response.error_message);
    assert_eq!(response.body, pattern_bytes(100_000));

    let calls = calls.lock().unwrap();
    assert!(!calls.is_empty());
    assert!(calls.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(calls.last(), Some(&(100_000, 100_000)));
}

#[test]
fn progress_abort_stops_the_read() {
    let base = start_server();
    let client = HttpClient::new();
    let url = format!("{base}/bytes/100000");
    let args = client
        .create_request(&url, HttpMethod::Get)
        .on_progress(|_, _| false);

    let response = client.get(&url, &args);
    assert_eq!(response.error_code, HttpErrorCode::ChunkReadError);
    assert_eq!(response.status_code, 200);
}

#[test]
fn small_body_still_reports_progress() {
    let url = raw_server(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");
    let client = HttpClient::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let args = client
        .create_request(&url, HttpMethod::Get)
        .on_progress(move |so_far, total| {
            sink.lock().unwrap().push((so_far, total));
            false
        });

    let response = client.get(&url, &args);
    assert_eq!(calls.lock().unwrap().as_slice(), &[(5, 5)]);
    assert_eq!(response.error_code, HttpErrorCode::ChunkReadError);
    assert_eq!(response.status_code, 200);
}

#[test]
fn chunked_body_is_reassembled() {
    let base = start_server();
    let response = get(&format!("{base}/chunked"));
    assert!(response.is_ok(), "{}", response.error_message);
    assert_eq!(response.body_text(), CHUNKED_PARTS.concat());
    assert_eq!(response.headers.find("transfer-encoding"), Some("chunked"));
}

#[test]
fn gzip_body_matches_reference_client() {
    let base = start_server();
    let client = HttpClient::new();
    let url = format!("{base}/gzip");
    let mut args = client.create_request(&url, HttpMethod::Get);
    args.options.compress = true;

    let response = client.get(&url, &args);
    assert!(response.is_ok(), "{}", response.error_message);
    assert_eq!(response.body_text(), GZIP_PLAINTEXT);
    let wire_length: u64 = response
        .headers
        .find("content-length")
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(response.download_size, wire_length);

    let reference = ureq::get(&url)
        .call()
        .unwrap()
        .body_mut()
        .read_to_string()
        .unwrap();
    assert_eq!(response.body_text(), reference);
}

// --- redirects ---

#[test]
fn relative_redirect_chain() {
    let base = start_server();
    let response = get(&format!("{base}/redirect/3"));
    assert!(response.is_ok(), "{}", response.error_message);
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body_text(), REDIRECT_DONE);
}

#[test]
fn absolute_redirect_chain() {
    let base = start_server();
    let response = get(&format!("{base}/absolute-redirect/3"));
    assert!(response.is_ok(), "{}", response.error_message);
    assert_eq!(response.body_text(), REDIRECT_DONE);
}

#[test]
fn redirect_bound_is_enforced() {
    let base = start_server();
    let client = HttpClient::new();
    let url = format!("{base}/redirect/5");
    let mut args = client.create_request(&url, HttpMethod::Get);
    args.options.max_redirects = 2;

    let response = client.get(&url, &args);
    assert_eq!(response.error_code, HttpErrorCode::TooManyRedirects);
    assert_eq!(response.error_message, "Too many redirects: 2");
    assert_eq!(response.status_code, 302);
}

#[test]
fn redirects_can_be_disabled() {
    let base = start_server();
    let client = HttpClient::new();
    let url = format!("{base}/redirect/1");
    let mut args = client.create_request(&url, HttpMethod::Get);
    args.options.follow_redirects = false;

    let response = client.get(&url, &args);
    assert!(response.is_ok(), "{}", response.error_message);
    assert_eq!(response.status_code, 302);
    assert_eq!(response.headers.find("Location"), Some("/redirect/0"));
}

#[test]
fn redirect_without_location() {
    let base = start_server();
    let response = get(&format!("{base}/no-location"));
    assert_eq!(response.error_code, HttpErrorCode::MissingLocation);
    assert_eq!(response.status_code, 302);
}

// --- timeouts and failures ---

#[test]
fn transfer_timeout_cancels_slow_response() {
    let base = start_server();
    let client = HttpClient::new();
    let url = format!("{base}/delay/3000");
    let mut args = client.create_request(&url, HttpMethod::Get);
    args.options.transfer_timeout_ms = 200;

    let started = Instant::now();
    let response = client.get(&url, &args);
    assert_eq!(response.error_code, HttpErrorCode::CannotReadStatusLine);
    assert!(started.elapsed() < Duration::from_millis(2000));
}

#[test]
fn malformed_url() {
    let response = get("not a url");
    assert_eq!(response.error_code, HttpErrorCode::UrlMalformed);
    assert!(response.error_message.starts_with("Cannot parse url"));
}

#[test]
fn connection_refused() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let url = format!("http://{addr}/");
    let response = get(&url);
    assert_eq!(response.error_code, HttpErrorCode::CannotConnect);
    assert!(response
        .error_message
        .starts_with(&format!("Cannot connect to url: {url} / error : ")));
}

#[test]
fn http_1_0_status_line_is_rejected() {
    let url = raw_server(b"HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\n");
    let response = get(&url);
    assert_eq!(response.error_code, HttpErrorCode::MissingStatus);
}

#[test]
fn truncated_fixed_length_body() {
    let url = raw_server(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc");
    let response = get(&url);
    assert_eq!(response.error_code, HttpErrorCode::ChunkReadError);
    assert_eq!(response.status_code, 200);
}

#[test]
fn bad_chunk_size() {
    let url = raw_server(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\nhello\r\n0\r\n\r\n");
    let response = get(&url);
    assert_eq!(response.error_code, HttpErrorCode::ChunkReadError);
}

#[test]
fn response_without_framing() {
    let url = raw_server(b"HTTP/1.1 200 OK\r\nServer: raw\r\n\r\nbody until close");
    let response = get(&url);
    assert_eq!(response.error_code, HttpErrorCode::CannotReadBody);
    assert_eq!(response.headers.get("Server"), Some("raw"));
}

#[test]
fn verbose_dump_reaches_logger() {
    let base = start_server();
    let client = HttpClient::new();
    let url = format!("{base}/chunked");
    let log = Arc::new(Mutex::new(String::new()));
    let sink = Arc::clone(&log);
    let mut args: RequestArgs = client
        .create_request(&url, HttpMethod::Get)
        .logger(move |msg| sink.lock().unwrap().push_str(msg));
    args.options.verbose = true;

    assert!(client.get(&url, &args).is_ok());
    let log = log.lock().unwrap();
    assert!(log.contains("Sending GET request to 127.0.0.1:"));
    assert!(log.contains("Status line HTTP/1.1 200 OK"));
    assert!(log.contains("Reading 0 bytes"));
}
