//! Chunk Transport: One push connection, read on a dedicated thread.
//!
//! The reader thread owns the connection, frames SSE, normalizes events
//! and forwards them over a channel. The owner receives them on its own
//! (single) thread, so no state is shared beyond the shutdown flag.
//!
//! Each `start` creates a fresh channel and `close` drops the receiver,
//! so a late event from a closed connection can never be observed.
//!
//! A read that times out is not a failure: the reader checks the shutdown
//! flag and reads again. Connections are therefore released within one
//! read timeout of `close`. A body that blocks without ever timing out
//! holds its connection until its next read returns.

use super::event::{Channel, ChunkEvent, TransportEvent};
use super::sse::{SseEvent, SseParser};
use crate::error::TransportError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Opens the byte stream behind a push channel.
pub trait Connector: Send + Sync {
    /// Open `url` and return the response body.
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, TransportError>;
}

/// `reqwest`-backed connector.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::blocking::Client,
}

impl HttpConnector {
    /// Build a connector.
    ///
    /// `read_timeout` bounds each body read and the wait for response
    /// headers. It never ends the stream: a timed-out read only lets the
    /// reader notice `close`. `None` blocks until the server sends bytes.
    pub fn new(
        connect_timeout: Duration,
        read_timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Connector for HttpConnector {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, TransportError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(Box::new(HttpBody(response)))
    }
}

/// Response body with read timeouts surfaced as `TimedOut`.
struct HttpBody(reqwest::blocking::Response);

impl Read for HttpBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf).map_err(|err| {
            let timed_out = err
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
                .is_some_and(reqwest::Error::is_timeout);
            if timed_out {
                io::Error::new(io::ErrorKind::TimedOut, err)
            } else {
                err
            }
        })
    }
}

/// Configuration for a transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Push endpoint. `None` makes `start` a no-op.
    pub url: Option<String>,
    /// Connect timeout for [`HttpConnector`].
    pub connect_timeout: Duration,
    /// Per-read timeout for [`HttpConnector`]; bounds how long `close`
    /// waits on an idle connection.
    pub read_timeout: Option<Duration>,
    /// Read buffer size.
    pub read_chunk: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Some(Duration::from_secs(2)),
            read_chunk: 8 * 1024,
        }
    }
}

/// A started connection.
struct ActiveStream {
    /// Reader thread; never joined, a blocked read would hang the owner.
    _handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
    events: Receiver<TransportEvent>,
}

/// Owns at most one push connection.
pub struct ChunkTransport {
    config: TransportConfig,
    connector: Arc<dyn Connector>,
    active: Option<ActiveStream>,
}

impl std::fmt::Debug for ChunkTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkTransport")
            .field("url", &self.config.url)
            .field("active", &self.active.is_some())
            .finish_non_exhaustive()
    }
}

impl ChunkTransport {
    /// Create a transport using `connector` to open connections.
    pub fn new(config: TransportConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            active: None,
        }
    }

    /// Create a transport over HTTP.
    pub fn http(config: TransportConfig) -> Result<Self, TransportError> {
        let connector = HttpConnector::new(config.connect_timeout, config.read_timeout)?;
        Ok(Self::new(config, Arc::new(connector)))
    }

    /// Whether a connection is open.
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Receiver for the open connection's events.
    pub fn receiver(&self) -> Option<&Receiver<TransportEvent>> {
        self.active.as_ref().map(|active| &active.events)
    }

    /// Open the connection.
    ///
    /// Returns `false` without doing anything if a connection is already
    /// open or no URL is configured.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to spawn the reader thread.
    pub fn start(&mut self) -> bool {
        if self.active.is_some() {
            return false;
        }
        let Some(url) = self.config.url.clone() else {
            debug!("transport has no url; not starting");
            return false;
        };

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let (tx, rx) = unbounded();
        let connector = self.connector.clone();
        let read_chunk = self.config.read_chunk.max(1);

        let handle = thread::Builder::new()
            .name("streamark-transport".to_string())
            .spawn(move || {
                Self::run_loop(connector.as_ref(), &url, &tx, &shutdown_clone, read_chunk);
            })
            .expect("Failed to spawn transport thread");

        self.active = Some(ActiveStream {
            _handle: handle,
            shutdown,
            events: rx,
        });
        true
    }

    /// Release the connection. Safe to call repeatedly or before `start`.
    ///
    /// Returns immediately. The reader thread drops the body once its
    /// current read returns, either with data or with a read timeout.
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            active.shutdown.store(true, Ordering::Relaxed);
            debug!("transport closed");
        }
    }

    /// Reader loop: open, frame, normalize, forward.
    fn run_loop(
        connector: &dyn Connector,
        url: &str,
        tx: &Sender<TransportEvent>,
        shutdown: &AtomicBool,
        read_chunk: usize,
    ) {
        let mut body = match connector.open(url) {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "push connection failed to open");
                let _ = tx.send(TransportEvent::Failed(err));
                return;
            }
        };

        let mut parser = SseParser::new();
        let mut pending: Vec<u8> = Vec::new();
        let mut buf = vec![0u8; read_chunk];

        loop {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if is_idle_read(&e) => continue,
                Err(e) => {
                    if !shutdown.load(Ordering::Relaxed) {
                        warn!(error = %e, "push connection read failed");
                        let _ = tx.send(TransportEvent::Failed(TransportError::Read(e.to_string())));
                    }
                    return;
                }
            };

            pending.extend_from_slice(&buf[..n]);
            let text = take_utf8_prefix(&mut pending);
            for event in parser.feed(&text) {
                match Self::forward(&event, tx, shutdown) {
                    Forward::Continue => {}
                    Forward::Finished | Forward::Disconnected => return,
                }
            }
        }

        if !pending.is_empty() {
            let tail = String::from_utf8_lossy(&pending).into_owned();
            for event in parser.feed(&tail) {
                if !matches!(Self::forward(&event, tx, shutdown), Forward::Continue) {
                    return;
                }
            }
        }
        if let Some(event) = parser.flush() {
            if !matches!(Self::forward(&event, tx, shutdown), Forward::Continue) {
                return;
            }
        }

        if !shutdown.load(Ordering::Relaxed) {
            warn!("push connection ended before completion");
            let _ = tx.send(TransportEvent::Failed(TransportError::Dropped));
        }
    }

    fn forward(event: &SseEvent, tx: &Sender<TransportEvent>, shutdown: &AtomicBool) -> Forward {
        let Some(channel) = Channel::from_name(&event.event) else {
            trace!(event = %event.event, "ignoring unsubscribed event");
            return Forward::Continue;
        };
        if shutdown.load(Ordering::Relaxed) {
            return Forward::Disconnected;
        }
        let chunk = ChunkEvent::normalize(channel, &event.data);
        let terminal = chunk.is_terminal();
        if tx.send(TransportEvent::Chunk(chunk)).is_err() {
            return Forward::Disconnected;
        }
        if terminal {
            Forward::Finished
        } else {
            Forward::Continue
        }
    }
}

impl Drop for ChunkTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Outcome of forwarding one event.
enum Forward {
    Continue,
    Finished,
    Disconnected,
}

/// Reads that returned nothing yet but leave the connection usable.
fn is_idle_read(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

/// Drain the longest valid UTF-8 prefix of `pending`.
///
/// An incomplete trailing sequence stays behind for the next read; any
/// invalid bytes are replaced.
fn take_utf8_prefix(pending: &mut Vec<u8>) -> String {
    match std::str::from_utf8(pending) {
        Ok(text) => {
            let text = text.to_owned();
            pending.clear();
            text
        }
        Err(err) => {
            let valid = err.valid_up_to();
            let cut = match err.error_len() {
                // Genuinely invalid bytes: consume them lossily.
                Some(len) => valid + len,
                // Truncated sequence at the end: keep it.
                None => valid,
            };
            let text = String::from_utf8_lossy(&pending[..cut]).into_owned();
            pending.drain(..cut);
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;
    use std::time::Instant;

    /// Serves a canned body, or fails to connect.
    struct StaticConnector {
        body: Option<Vec<u8>>,
    }

    impl Connector for StaticConnector {
        fn open(&self, _url: &str) -> Result<Box<dyn Read + Send>, TransportError> {
            self.body
                .clone()
                .map(|body| Box::new(Cursor::new(body)) as Box<dyn Read + Send>)
                .ok_or_else(|| TransportError::Connect("refused".into()))
        }
    }

    fn transport(body: Option<&str>, url: Option<&str>) -> ChunkTransport {
        let config = TransportConfig {
            url: url.map(str::to_owned),
            read_chunk: 7,
            ..TransportConfig::default()
        };
        let connector = StaticConnector {
            body: body.map(|b| b.as_bytes().to_vec()),
        };
        ChunkTransport::new(config, Arc::new(connector))
    }

    fn collect(transport: &ChunkTransport) -> Vec<TransportEvent> {
        let rx = transport.receiver().unwrap();
        let mut events = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_millis(500)) {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_stream_normalized_events() {
        let body = "event: message\ndata: Hel\n\n\
                    event: ping\ndata: x\n\n\
                    event: message\ndata: lo[newline]\n\n\
                    event: meta\ndata: {bad\n\n\
                    event: done\ndata: {\"id\":\"42\"}\n\n\
                    event: message\ndata: after done\n\n";
        let mut t = transport(Some(body), Some("http://test/stream"));
        assert!(t.start());
        let events = collect(&t);
        assert_eq!(
            events,
            vec![
                TransportEvent::Chunk(ChunkEvent::Message { text: "Hel".into() }),
                TransportEvent::Chunk(ChunkEvent::Message { text: "lo\n".into() }),
                TransportEvent::Chunk(ChunkEvent::Meta { payload: json!({}) }),
                TransportEvent::Chunk(ChunkEvent::Done { payload: json!({"id": "42"}) }),
            ]
        );
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut t = transport(Some("event: done\ndata: {}\n\n"), Some("http://test"));
        assert!(t.start());
        assert!(!t.start());
        assert!(t.is_active());
    }

    #[test]
    fn test_start_without_url_is_noop() {
        let mut t = transport(Some(""), None);
        assert!(!t.start());
        assert!(!t.is_active());
        assert!(t.receiver().is_none());
    }

    #[test]
    fn test_close_before_start_and_twice() {
        let mut t = transport(None, Some("http://test"));
        t.close();
        assert!(t.start());
        t.close();
        t.close();
        assert!(!t.is_active());
    }

    #[test]
    fn test_connect_failure_is_reported() {
        let mut t = transport(None, Some("http://test"));
        t.start();
        let events = collect(&t);
        assert_eq!(
            events,
            vec![TransportEvent::Failed(TransportError::Connect("refused".into()))]
        );
    }

    #[test]
    fn test_drop_before_done_is_reported() {
        let mut t = transport(Some("event: message\ndata: Par\n\n"), Some("http://test"));
        t.start();
        let events = collect(&t);
        assert_eq!(
            events,
            vec![
                TransportEvent::Chunk(ChunkEvent::Message { text: "Par".into() }),
                TransportEvent::Failed(TransportError::Dropped),
            ]
        );
    }

    /// Behaves like a socket with a receive timeout: every read waits a
    /// little and times out until `body` is due. Records when it is dropped.
    struct SlowReader {
        body: Cursor<Vec<u8>>,
        due: Instant,
        dropped: Arc<AtomicBool>,
    }

    impl Read for SlowReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if Instant::now() < self.due {
                thread::sleep(Duration::from_millis(20));
                return Err(io::ErrorKind::TimedOut.into());
            }
            self.body.read(buf)
        }
    }

    impl Drop for SlowReader {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    struct SlowConnector {
        body: &'static str,
        delay: Duration,
        dropped: Arc<AtomicBool>,
    }

    impl Connector for SlowConnector {
        fn open(&self, _url: &str) -> Result<Box<dyn Read + Send>, TransportError> {
            Ok(Box::new(SlowReader {
                body: Cursor::new(self.body.as_bytes().to_vec()),
                due: Instant::now() + self.delay,
                dropped: self.dropped.clone(),
            }))
        }
    }

    fn slow_transport(body: &'static str, delay: Duration) -> (ChunkTransport, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        let connector = SlowConnector {
            body,
            delay,
            dropped: dropped.clone(),
        };
        let config = TransportConfig {
            url: Some("http://test".into()),
            ..TransportConfig::default()
        };
        (ChunkTransport::new(config, Arc::new(connector)), dropped)
    }

    #[test]
    fn test_close_releases_idle_connection() {
        let (mut t, dropped) = slow_transport("event: done\ndata: {}\n\n", Duration::from_secs(5));
        assert!(t.start());
        thread::sleep(Duration::from_millis(100));
        assert!(!dropped.load(Ordering::SeqCst));

        t.close();
        thread::sleep(Duration::from_millis(500));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_read_timeouts_are_not_failures() {
        let body = "event: message\ndata: late\n\nevent: done\ndata: {}\n\n";
        let (mut t, dropped) = slow_transport(body, Duration::from_millis(150));
        assert!(t.start());
        let events = collect(&t);
        assert_eq!(
            events,
            vec![
                TransportEvent::Chunk(ChunkEvent::Message { text: "late".into() }),
                TransportEvent::Chunk(ChunkEvent::Done { payload: json!({}) }),
            ]
        );
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_take_utf8_prefix_keeps_split_sequence() {
        let snowman = "☃".as_bytes();
        let mut pending = b"ab".to_vec();
        pending.extend_from_slice(&snowman[..2]);
        assert_eq!(take_utf8_prefix(&mut pending), "ab");
        assert_eq!(pending.len(), 2);
        pending.extend_from_slice(&snowman[2..]);
        assert_eq!(take_utf8_prefix(&mut pending), "☃");
        assert!(pending.is_empty());
    }
}
