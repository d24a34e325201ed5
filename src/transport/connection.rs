//! Physical WebSocket connection.
//!
//! A [`Connector`] turns a URL into a live transport. The transport reports
//! what happens to it through a [`TransportSink`] and accepts outbound text
//! through a [`TransportHandle`].
//!
//! # Event Loop
//!
//! [`WsConnector`] spawns one tokio task per connection attempt that handles:
//!
//! - The client handshake (`connect_async`), bounded by a timeout
//! - Incoming text frames, forwarded to the sink untouched
//! - Outgoing text frames from the handle
//! - Close/error reporting, exactly once per attempt
//!
//! Every event is tagged with the attempt's epoch so the consumer can drop
//! events from attempts it has already abandoned.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// TransportEvent
// ============================================================================

/// What happened to a connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    /// Handshake completed; the socket is open.
    Opened,
    /// Inbound text frame.
    Frame(String),
    /// Socket closed.
    Closed {
        /// Close reason sent by the peer, if any.
        reason: Option<String>,
    },
    /// Socket failed (handshake or I/O error).
    Failed {
        /// Error description.
        reason: String,
    },
    /// Reconnect backoff timer fired.
    BackoffElapsed,
}

/// A [`TransportEventKind`] tagged with the attempt epoch that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    /// Connection attempt the event belongs to.
    pub epoch: u64,
    /// The event.
    pub kind: TransportEventKind,
}

/// Queue shared by all attempts.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiving end of the event queue.
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

// ============================================================================
// TransportSink
// ============================================================================

/// Reporting side of one connection attempt.
#[derive(Debug, Clone)]
pub struct TransportSink {
    /// Attempt epoch stamped on every event.
    epoch: u64,
    /// Shared event queue.
    events: EventSender,
}

impl TransportSink {
    /// Creates a sink for attempt `epoch`.
    #[inline]
    #[must_use]
    pub fn new(epoch: u64, events: EventSender) -> Self {
        Self { epoch, events }
    }

    /// Returns the attempt epoch.
    #[inline]
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Reports that the socket is open.
    pub fn opened(&self) {
        self.emit(TransportEventKind::Opened);
    }

    /// Reports an inbound text frame.
    pub fn frame(&self, text: impl Into<String>) {
        self.emit(TransportEventKind::Frame(text.into()));
    }

    /// Reports that the socket closed.
    pub fn closed(&self, reason: Option<String>) {
        self.emit(TransportEventKind::Closed { reason });
    }

    /// Reports that the socket failed.
    pub fn failed(&self, reason: impl Into<String>) {
        self.emit(TransportEventKind::Failed {
            reason: reason.into(),
        });
    }

    /// Reports that the backoff timer fired.
    pub fn backoff_elapsed(&self) {
        self.emit(TransportEventKind::BackoffElapsed);
    }

    fn emit(&self, kind: TransportEventKind) {
        let event = TransportEvent {
            epoch: self.epoch,
            kind,
        };
        if self.events.send(event).is_err() {
            trace!(epoch = self.epoch, "Event queue closed, dropping transport event");
        }
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// Instructions for the socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write a text frame.
    Text(String),
    /// Close the socket.
    Close,
}

/// Socket-task side of a [`TransportHandle`].
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::UnboundedReceiver<Outbound>,
}

impl OutboundReceiver {
    /// Waits for the next instruction. `None` once the handle is dropped.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.rx.recv().await
    }

    /// Returns the next queued instruction without waiting.
    pub fn try_recv(&mut self) -> Option<Outbound> {
        self.rx.try_recv().ok()
    }
}

// ============================================================================
// TransportHandle
// ============================================================================

/// Client side of a live transport.
#[derive(Debug)]
pub struct TransportHandle {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl TransportHandle {
    /// Creates a connected handle/receiver pair.
    #[must_use]
    pub fn channel() -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, OutboundReceiver { rx })
    }

    /// Queues a text frame.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] if the socket task has ended.
    pub fn send_text(&self, text: String) -> Result<()> {
        self.tx
            .send(Outbound::Text(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Asks the socket task to close.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    /// Returns `true` if the socket task has ended.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Opens transports.
///
/// `connect` must not block: it either starts an attempt and returns its
/// handle, or fails synchronously (a construction failure). Everything after
/// that is reported through the sink.
pub trait Connector: Send + Sync + 'static {
    /// Starts a connection attempt to `url`.
    ///
    /// # Errors
    ///
    /// Any error here is treated as a transport construction failure.
    fn connect(&self, url: &Url, sink: TransportSink) -> Result<TransportHandle>;
}

// ============================================================================
// WsConnector
// ============================================================================

/// Default upper bound on the WebSocket handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy)]
pub struct WsConnector {
    /// Attempts still handshaking after this long are reported as failed.
    handshake_timeout: Duration,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl WsConnector {
    /// Creates a connector with [`DEFAULT_HANDSHAKE_TIMEOUT`].
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Returns the handshake timeout.
    #[inline]
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }
}

impl Connector for WsConnector {
    fn connect(&self, url: &Url, sink: TransportSink) -> Result<TransportHandle> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::invalid_url(
                url.as_str(),
                "streaming transport requires a ws:// or wss:// URL",
            ));
        }

        let runtime = Handle::try_current()
            .map_err(|e| Error::connection(format!("no async runtime: {e}")))?;

        let (handle, outbound) = TransportHandle::channel();
        runtime.spawn(run_socket(
            url.clone(),
            self.handshake_timeout,
            sink,
            outbound,
        ));

        Ok(handle)
    }
}

/// Socket task for one connection attempt.
async fn run_socket(
    url: Url,
    handshake_timeout: Duration,
    sink: TransportSink,
    mut outbound: OutboundReceiver,
) {
    let epoch = sink.epoch();

    let ws_stream = tokio::select! {
        result = tokio::time::timeout(handshake_timeout, connect_async(url.as_str())) => match result {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(e)) => {
                let err = Error::from(e);
                warn!(epoch, url = %url, error = %err, "WebSocket handshake failed");
                sink.failed(err.to_string());
                return;
            }
            Err(_) => {
                let err = Error::connection(format!(
                    "handshake timed out after {}ms",
                    handshake_timeout.as_millis()
                ));
                warn!(epoch, url = %url, error = %err, "WebSocket handshake stalled");
                sink.failed(err.to_string());
                return;
            }
        },

        instruction = outbound.recv() => {
            if matches!(instruction, Some(Outbound::Close) | None) {
                debug!(epoch, "Connection abandoned during handshake");
                return;
            }
            // Sends are gated on authentication, so nothing else can be
            // queued before the handshake finishes.
            warn!(epoch, "Dropping frame queued before handshake");
            return;
        }
    };

    debug!(epoch, url = %url, "WebSocket open");
    sink.opened();

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(epoch, len = text.len(), "Frame received");
                        sink.frame(text.as_str());
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.as_str().to_string())
                            .filter(|r| !r.is_empty());
                        debug!(epoch, ?reason, "WebSocket closed by remote");
                        sink.closed(reason);
                        return;
                    }

                    Some(Err(e)) => {
                        let err = Error::from(e);
                        warn!(epoch, error = %err, "WebSocket error");
                        sink.failed(err.to_string());
                        return;
                    }

                    None => {
                        debug!(epoch, "WebSocket stream ended");
                        sink.closed(None);
                        return;
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            instruction = outbound.recv() => {
                match instruction {
                    Some(Outbound::Text(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            let err = Error::from(e);
                            warn!(epoch, error = %err, "WebSocket write failed");
                            sink.failed(err.to_string());
                            return;
                        }
                        trace!(epoch, "Frame sent");
                    }

                    Some(Outbound::Close) | None => {
                        debug!(epoch, "Closing WebSocket on request");
                        let _ = ws_write.close().await;
                        return;
                    }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_tags_events_with_epoch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = TransportSink::new(7, tx);

        sink.opened();
        sink.frame("{}");
        sink.closed(Some("bye".into()));

        assert_eq!(
            rx.try_recv().expect("opened"),
            TransportEvent {
                epoch: 7,
                kind: TransportEventKind::Opened
            }
        );
        assert_eq!(
            rx.try_recv().expect("frame").kind,
            TransportEventKind::Frame("{}".into())
        );
        assert_eq!(
            rx.try_recv().expect("closed").kind,
            TransportEventKind::Closed {
                reason: Some("bye".into())
            }
        );
    }

    #[test]
    fn test_sink_survives_closed_queue() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        TransportSink::new(1, tx).failed("gone");
    }

    #[test]
    fn test_handle_send_and_close() {
        let (handle, mut outbound) = TransportHandle::channel();
        handle.send_text("hello".into()).expect("send");
        handle.close();

        assert_eq!(outbound.try_recv(), Some(Outbound::Text("hello".into())));
        assert_eq!(outbound.try_recv(), Some(Outbound::Close));
        assert_eq!(outbound.try_recv(), None);
    }

    #[test]
    fn test_handle_reports_closed_receiver() {
        let (handle, outbound) = TransportHandle::channel();
        drop(outbound);
        assert!(handle.is_closed());
        assert!(matches!(
            handle.send_text("x".into()),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_ws_connector_rejects_http_scheme() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let url = Url::parse("http://localhost/ws").expect("url");
        let result = WsConnector::new().connect(&url, TransportSink::new(1, tx));
        assert!(matches!(result, Err(Error::InvalidUrl { .. })));
    }

    #[test]
    fn test_ws_connector_requires_runtime() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let url = Url::parse("ws://localhost/ws").expect("url");
        let result = WsConnector::new().connect(&url, TransportSink::new(1, tx));
        assert!(matches!(result, Err(Error::Connection { .. })));
    }

    #[tokio::test]
    async fn test_ws_connector_reports_refused_connection() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        // Port 1 is never listening.
        let url = Url::parse("ws://127.0.0.1:1/ws").expect("url");
        let _handle = WsConnector::new()
            .connect(&url, TransportSink::new(3, tx))
            .expect("attempt starts");

        let event = rx.recv().await.expect("event");
        assert_eq!(event.epoch, 3);
        assert!(
            matches!(event.kind, TransportEventKind::Failed { ref reason } if reason.starts_with("WebSocket error"))
        );
    }

    #[tokio::test]
    async fn test_ws_connector_times_out_stalled_handshake() {
        // Accepts TCP but never answers the HTTP upgrade.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let url = Url::parse(&format!("ws://{addr}/ws")).expect("url");
        let connector = WsConnector::new().with_handshake_timeout(Duration::from_millis(100));
        let _handle = connector
            .connect(&url, TransportSink::new(4, tx))
            .expect("attempt starts");

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("reported before the test deadline")
            .expect("event");
        assert_eq!(event.epoch, 4);
        assert!(
            matches!(event.kind, TransportEventKind::Failed { ref reason } if reason.contains("timed out"))
        );
    }

    #[test]
    fn test_ws_connector_default_timeout() {
        assert_eq!(
            WsConnector::default().handshake_timeout(),
            DEFAULT_HANDSHAKE_TIMEOUT
        );
    }
}
