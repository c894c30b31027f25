//! In-memory transports for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cancel::Cancellation;
use crate::error::TransportError;
use crate::http::ProgressCallback;
use crate::transport::{Connector, Transport};

/// What the peer observed, shared by every transport a connector creates.
#[derive(Debug, Default)]
pub(crate) struct Wire {
    /// `(tls, host, port)` per created transport.
    pub connects: Mutex<Vec<(bool, String, u16)>>,
    pub requests: Mutex<Vec<Vec<u8>>>,
    pub body_reads: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl Wire {
    pub fn request_text(&self, index: usize) -> String {
        String::from_utf8_lossy(&self.requests.lock()[index]).into_owned()
    }
}

/// Replays a fixed byte stream; reads past the end report `Closed`.
pub(crate) struct ScriptedTransport {
    incoming: Vec<u8>,
    position: usize,
    refuse_connect: bool,
    line_delay: Option<Duration>,
    wire: Arc<Wire>,
    connected: bool,
}

impl ScriptedTransport {
    pub fn new(incoming: &[u8]) -> Self {
        Self {
            incoming: incoming.to_vec(),
            position: 0,
            refuse_connect: false,
            line_delay: None,
            wire: Arc::default(),
            connected: false,
        }
    }

    pub fn remaining(&self) -> &[u8] {
        &self.incoming[self.position..]
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        if self.connected {
            self.wire.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, _host: &str, _port: u16, _cancel: &Cancellation) -> Result<(), TransportError> {
        if self.refuse_connect {
            return Err(TransportError::Io(std::io::ErrorKind::ConnectionRefused.into()));
        }
        let active = self.wire.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.wire.max_active.fetch_max(active, Ordering::SeqCst);
        self.connected = true;
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8], _cancel: &Cancellation) -> Result<(), TransportError> {
        self.wire.requests.lock().push(data.to_vec());
        Ok(())
    }

    fn read_line(&mut self, cancel: &Cancellation) -> Result<String, TransportError> {
        if let Some(delay) = self.line_delay {
            std::thread::sleep(delay);
        }
        if cancel.is_requested() {
            return Err(TransportError::Cancelled);
        }
        let rest = &self.incoming[self.position..];
        let end = rest
            .iter()
            .position(|b| *b == b'\n')
            .ok_or(TransportError::Closed)?;
        let mut line = &rest[..end];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        let line = String::from_utf8_lossy(line).into_owned();
        self.position += end + 1;
        Ok(line)
    }

    fn read_bytes(
        &mut self,
        len: usize,
        progress: Option<&ProgressCallback>,
        cancel: &Cancellation,
    ) -> Result<Vec<u8>, TransportError> {
        self.wire.body_reads.fetch_add(1, Ordering::SeqCst);
        if cancel.is_requested() {
            return Err(TransportError::Cancelled);
        }
        if self.incoming.len() - self.position < len {
            self.position = self.incoming.len();
            return Err(TransportError::Closed);
        }
        let data = self.incoming[self.position..self.position + len].to_vec();
        self.position += len;
        if let Some(progress) = progress {
            if !progress(len as u64, len as u64) {
                return Err(TransportError::Aborted);
            }
        }
        Ok(data)
    }
}

pub(crate) enum Script {
    Respond(Vec<u8>),
    RefuseConnect,
    NoSocket,
}

/// Hands out one scripted transport per hop, in order.
pub(crate) struct ScriptedConnector {
    scripts: Mutex<VecDeque<Script>>,
    line_delay: Option<Duration>,
    pub wire: Arc<Wire>,
}

impl ScriptedConnector {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            line_delay: None,
            wire: Arc::default(),
        })
    }

    /// Every hop replays `response`, each line read after `delay`.
    pub fn repeating(response: &[u8], hops: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new((0..hops).map(|_| Script::Respond(response.to_vec())).collect()),
            line_delay: Some(delay),
            wire: Arc::default(),
        })
    }

    pub fn responses<I, B>(responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Self::new(
            responses
                .into_iter()
                .map(|r| Script::Respond(r.as_ref().to_vec())),
        )
    }
}

impl Connector for ScriptedConnector {
    fn create(&self, tls: bool, host: &str, port: u16) -> Result<Box<dyn Transport>, String> {
        self.wire.connects.lock().push((tls, host.to_string(), port));
        let script = self
            .scripts
            .lock()
            .pop_front()
            .ok_or_else(|| "script exhausted".to_string())?;
        let mut transport = match script {
            Script::Respond(bytes) => ScriptedTransport::new(&bytes),
            Script::RefuseConnect => {
                let mut transport = ScriptedTransport::new(b"");
                transport.refuse_connect = true;
                transport
            }
            Script::NoSocket => return Err("no socket available".to_string()),
        };
        transport.line_delay = self.line_delay;
        transport.wire = Arc::clone(&self.wire);
        Ok(Box::new(transport))
    }
}
