//! Event feed adapter.
//!
//! Maintains the single logical connection to the settlement node's event
//! feed. Inbound frames are parsed as JSON and forwarded to the monitor;
//! unparseable frames are dropped at debug level. On unexpected disconnect
//! the adapter sleeps the fixed reconnect interval and tries again,
//! indefinitely, until `stop()` is called. Reconnection attempts run inside
//! one task, so they never overlap.

use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::MonitorError;
use crate::events::FeedEvent;
use crate::metrics;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a connected session ended
#[derive(Debug, Clone, Copy)]
enum SessionEnd {
    Closed,
    StreamEnded,
    ReadError,
    ReceiverGone,
}

pub struct FeedAdapter {
    url: String,
    connect_timeout: Duration,
    reconnect_interval: Duration,
    shutdown: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
    connected_tx: watch::Sender<bool>,
    connected_rx: watch::Receiver<bool>,
}

impl FeedAdapter {
    pub fn new(config: &Config) -> Self {
        let (connected_tx, connected_rx) = watch::channel(false);
        Self {
            url: config.feed_url(),
            connect_timeout: config.connect_timeout(),
            reconnect_interval: config.reconnect_interval(),
            shutdown: Arc::new(AtomicBool::new(false)),
            task: None,
            connected_tx,
            connected_rx,
        }
    }

    /// Watch the connection state (`true` while a session is up)
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.connected_rx.clone()
    }

    /// Establish the feed connection and spawn the read loop.
    ///
    /// Fails with a connection error if the first connection cannot be
    /// established within the configured timeout; nothing is spawned in
    /// that case. Decoded events are delivered on `events`.
    pub async fn start(
        &mut self,
        events: mpsc::UnboundedSender<FeedEvent>,
    ) -> Result<(), MonitorError> {
        if self.task.is_some() {
            return Err(MonitorError::connection("adapter already started"));
        }
        self.shutdown.store(false, Ordering::Relaxed);

        let ws = connect(&self.url, self.connect_timeout).await?;
        self.connected_tx.send_replace(true);
        info!(url = %self.url, "Feed connection established");

        let url = self.url.clone();
        let connect_timeout = self.connect_timeout;
        let reconnect_interval = self.reconnect_interval;
        let shutdown = self.shutdown.clone();
        let connected = self.connected_tx.clone();
        let handle = tokio::spawn(async move {
            feed_loop(
                ws,
                url,
                connect_timeout,
                reconnect_interval,
                shutdown,
                connected,
                events,
            )
            .await;
        });
        self.task = Some(handle);
        Ok(())
    }

    /// Close the connection and cancel any pending reconnection.
    ///
    /// Safe to call at any time, including mid-reconnect; no further
    /// events are delivered afterwards. Idempotent.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.task.take() {
            handle.abort();
            info!("Feed adapter stopped");
        }
        self.connected_tx.send_replace(false);
    }
}

impl Drop for FeedAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn connect(url: &str, connect_timeout: Duration) -> Result<WsStream, MonitorError> {
    let (ws, _) = timeout(connect_timeout, connect_async(url))
        .await
        .map_err(|_| {
            MonitorError::Connection(format!(
                "timed out connecting to {} after {}ms",
                url,
                connect_timeout.as_millis()
            ))
        })?
        .map_err(|e| MonitorError::Connection(format!("connecting to {}: {}", url, e)))?;
    Ok(ws)
}

/// Session loop with reconnection. The initial session uses the connection
/// `start()` already established; later sessions reconnect after the fixed
/// interval.
async fn feed_loop(
    initial: WsStream,
    url: String,
    connect_timeout: Duration,
    reconnect_interval: Duration,
    shutdown: Arc<AtomicBool>,
    connected: watch::Sender<bool>,
    events: mpsc::UnboundedSender<FeedEvent>,
) {
    let mut session = Some(initial);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        if let Some(ws) = session.take() {
            let end = run_session(ws, &shutdown, &events).await;
            connected.send_replace(false);
            if matches!(end, SessionEnd::ReceiverGone) {
                debug!("Event receiver dropped; stopping feed loop");
                break;
            }
            warn!(end = ?end, "Feed connection lost");
        }

        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        tokio::time::sleep(reconnect_interval).await;

        match connect(&url, connect_timeout).await {
            Ok(ws) => {
                connected.send_replace(true);
                metrics::record_reconnect();
                info!(url = %url, "Feed connection re-established");
                session = Some(ws);
            }
            Err(e) => {
                warn!(
                    error = %e,
                    retry_ms = reconnect_interval.as_millis() as u64,
                    "Reconnection attempt failed"
                );
            }
        }
    }
}

/// Read frames from one connected session until it ends
async fn run_session(
    ws: WsStream,
    shutdown: &Arc<AtomicBool>,
    events: &mpsc::UnboundedSender<FeedEvent>,
) -> SessionEnd {
    let (mut write, mut read) = ws.split();

    while let Some(frame) = read.next().await {
        if shutdown.load(Ordering::Relaxed) {
            return SessionEnd::Closed;
        }

        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<FeedEvent>(&text) {
                Ok(event) => {
                    if events.send(event).is_err() {
                        return SessionEnd::ReceiverGone;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Dropping unparseable feed frame");
                    metrics::record_dropped_frame();
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = write.send(Message::Pong(payload)).await;
            }
            Ok(Message::Close(_)) => {
                info!("Feed closed the connection");
                return SessionEnd::Closed;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "WebSocket read error");
                return SessionEnd::ReadError;
            }
        }
    }

    SessionEnd::StreamEnded
}
