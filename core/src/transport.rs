//! Transport sessions: one physical connection with cancellable primitives.
//!
//! # Design
//! The engine talks to the network only through the `Transport` trait, and
//! obtains sessions from a `Connector`. `SocketTransport` is the production
//! implementation over `std::net::TcpStream`, optionally wrapped in a rustls
//! client session. Sockets are put in blocking mode with a short read/write
//! timeout so every primitive can poll its `Cancellation` between partial
//! reads and writes.
//!
//! Name resolution goes through the blocking system resolver, which cannot
//! be interrupted, so a slow lookup can overrun the connect deadline. The
//! deadline and stop flag are checked as soon as addresses are known.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::cancel::Cancellation;
use crate::error::TransportError;
use crate::http::ProgressCallback;

/// Upper bound on how long a blocked primitive goes without polling.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

const READ_CHUNK: usize = 16 * 1024;

/// Longest status or header line accepted, terminator included.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// One connection to one server.
pub trait Transport: Send {
    fn connect(&mut self, host: &str, port: u16, cancel: &Cancellation) -> Result<(), TransportError>;

    fn write_bytes(&mut self, data: &[u8], cancel: &Cancellation) -> Result<(), TransportError>;

    /// Read one line, without its `\n` or `\r\n` terminator.
    fn read_line(&mut self, cancel: &Cancellation) -> Result<String, TransportError>;

    /// Read exactly `len` bytes.
    fn read_bytes(
        &mut self,
        len: usize,
        progress: Option<&ProgressCallback>,
        cancel: &Cancellation,
    ) -> Result<Vec<u8>, TransportError>;
}

/// Hands out a fresh, unconnected transport for each request hop.
pub trait Connector: Send + Sync {
    fn create(&self, tls: bool, host: &str, port: u16) -> Result<Box<dyn Transport>, String>;
}

/// Connector producing `SocketTransport`s; TLS sessions trust the
/// `webpki-roots` bundle.
#[derive(Debug, Default)]
pub struct DefaultConnector {
    tls_config: OnceLock<Result<Arc<ClientConfig>, String>>,
}

impl DefaultConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn tls_config(&self) -> Result<Arc<ClientConfig>, String> {
        self.tls_config
            .get_or_init(|| build_tls_config().map_err(|e| e.to_string()))
            .clone()
    }
}

impl Connector for DefaultConnector {
    fn create(&self, tls: bool, _host: &str, _port: u16) -> Result<Box<dyn Transport>, String> {
        if tls {
            let config = self.tls_config()?;
            return Ok(Box::new(SocketTransport::tls(config)));
        }
        Ok(Box::new(SocketTransport::plain()))
    }
}

fn build_tls_config() -> Result<Arc<ClientConfig>, rustls::Error> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();
    Ok(Arc::new(config))
}

trait Stream: Read + Write + Send {}

impl<T: Read + Write + Send> Stream for T {}

/// TCP transport, plain or TLS.
pub struct SocketTransport {
    tls: Option<Arc<ClientConfig>>,
    stream: Option<Box<dyn Stream>>,
    buffer: Vec<u8>,
}

impl SocketTransport {
    pub fn plain() -> Self {
        Self {
            tls: None,
            stream: None,
            buffer: Vec::new(),
        }
    }

    pub fn tls(config: Arc<ClientConfig>) -> Self {
        Self {
            tls: Some(config),
            ..Self::plain()
        }
    }

    /// Pull at least one more byte into the read buffer.
    fn fill(&mut self, cancel: &Cancellation) -> Result<usize, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if cancel.is_requested() {
                return Err(TransportError::Cancelled);
            }
            match stream.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(e) if is_transient(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Transport for SocketTransport {
    fn connect(&mut self, host: &str, port: u16, cancel: &Cancellation) -> Result<(), TransportError> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Resolve(format!("{host}:{port}: {e}")))?
            .collect();
        if cancel.is_requested() {
            return Err(TransportError::Cancelled);
        }

        let mut last_error = None;
        let mut connected = None;
        for addr in addrs {
            if cancel.is_requested() {
                return Err(TransportError::Cancelled);
            }
            let attempt = match cancel.remaining() {
                Some(remaining) if remaining.is_zero() => return Err(TransportError::Cancelled),
                Some(remaining) => TcpStream::connect_timeout(&addr, remaining),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "connect attempt failed");
                    last_error = Some(e);
                }
            }
        }
        let mut tcp = match (connected, last_error) {
            (Some(stream), _) => stream,
            (None, Some(e)) => return Err(e.into()),
            (None, None) => return Err(TransportError::Resolve(format!("{host}:{port}: no addresses"))),
        };

        tcp.set_nodelay(true)?;
        tcp.set_read_timeout(Some(POLL_INTERVAL))?;
        tcp.set_write_timeout(Some(POLL_INTERVAL))?;

        let Some(config) = &self.tls else {
            self.stream = Some(Box::new(tcp));
            return Ok(());
        };

        let name = ServerName::try_from(host.to_string())
            .map_err(|_| TransportError::InvalidServerName(host.to_string()))?;
        let mut session = ClientConnection::new(Arc::clone(config), name)?;
        while session.is_handshaking() {
            if cancel.is_requested() {
                return Err(TransportError::Cancelled);
            }
            match session.complete_io(&mut tcp) {
                Ok(_) => {}
                Err(e) if is_transient(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        tracing::debug!(host, port, "tls handshake complete");
        self.stream = Some(Box::new(StreamOwned::new(session, tcp)));
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8], cancel: &Cancellation) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let mut written = 0;
        while written < data.len() {
            if cancel.is_requested() {
                return Err(TransportError::Cancelled);
            }
            match stream.write(&data[written..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => written += n,
                Err(e) if is_transient(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        loop {
            if cancel.is_requested() {
                return Err(TransportError::Cancelled);
            }
            match stream.flush() {
                Ok(()) => return Ok(()),
                Err(e) if is_transient(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_line(&mut self, cancel: &Cancellation) -> Result<String, TransportError> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = self.buffer[scanned..].iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=scanned + pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }
            scanned = self.buffer.len();
            if scanned >= MAX_LINE_LEN {
                return Err(TransportError::LineTooLong(MAX_LINE_LEN));
            }
            self.fill(cancel)?;
        }
    }

    fn read_bytes(
        &mut self,
        len: usize,
        progress: Option<&ProgressCallback>,
        cancel: &Cancellation,
    ) -> Result<Vec<u8>, TransportError> {
        let mut reported = false;
        while self.buffer.len() < len {
            self.fill(cancel)?;
            if let Some(progress) = progress {
                let so_far = self.buffer.len().min(len) as u64;
                if !progress(so_far, len as u64) {
                    return Err(TransportError::Aborted);
                }
                reported = true;
            }
        }
        // Already buffered alongside the headers: still report once.
        if let Some(progress) = progress {
            if !reported && len > 0 && !progress(len as u64, len as u64) {
                return Err(TransportError::Aborted);
            }
        }
        Ok(self.buffer.drain(..len).collect())
    }
}

/// Read/write timeouts surface as `WouldBlock` on unix and `TimedOut` on
/// windows; both just mean "poll again".
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
