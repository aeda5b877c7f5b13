//! Connection manager owning the change-feed WebSocket

use super::log::ChangeEventLog;
use super::types::{ChangeEvent, ConnectionState};
use crate::error::Result;
use crate::store::SubscribableStore;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

type FeedSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Live {
    cancel: CancellationToken,
    reader: JoinHandle<()>,
}

/// Owner of the change-feed connection.
///
/// Holds at most one transport at a time and the two observable outputs:
/// the bounded event log and the connection state. Reconnection after a
/// drop is the caller's explicit `connect()`; the manager never retries on
/// its own. Not cloneable: the transport is exclusively owned, and dropping
/// the manager tears the connection down.
pub struct ConnectionManager {
    endpoint: String,
    table: Option<String>,
    state: SubscribableStore<ConnectionState>,
    log: ChangeEventLog,
    dropped: Arc<AtomicU64>,
    live: Arc<Mutex<Option<Live>>>,
}

impl ConnectionManager {
    /// Create a manager for `endpoint` (a `ws://` or `wss://` URL) with an
    /// event log retaining `capacity` events. Zero capacity is rejected.
    pub fn new(endpoint: impl Into<String>, capacity: usize) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            table: None,
            state: SubscribableStore::new(ConnectionState::Disconnected),
            log: ChangeEventLog::new(capacity)?,
            dropped: Arc::new(AtomicU64::new(0)),
            live: Arc::new(Mutex::new(None)),
        })
    }

    /// Scope the feed to a single table (forwarded to the backend as the
    /// `table` query parameter).
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Open the feed if it is not already open or opening.
    ///
    /// `token` rides along as the `token` query parameter. Redundant calls
    /// while Connecting or Connected are no-ops; at most one transport ever
    /// exists. Failures never surface as errors: a failed handshake logs,
    /// transitions back to Disconnected, and leaves the caller free to retry.
    pub async fn connect(&self, token: Option<&str>) {
        let mut live = self.live.lock().await;
        if live.is_some() || self.state.get() != ConnectionState::Disconnected {
            debug!(state = %self.state.get(), "connect ignored, transport already active");
            return;
        }
        self.state.set_if_changed(ConnectionState::Connecting);

        let url = self.feed_url(token);
        match connect_async(url.as_str()).await {
            Ok((socket, _response)) => {
                self.state.set_if_changed(ConnectionState::Connected);
                let cancel = CancellationToken::new();
                let reader = tokio::spawn(read_frames(
                    socket,
                    self.log.clone(),
                    self.state.clone(),
                    Arc::clone(&self.live),
                    Arc::clone(&self.dropped),
                    cancel.clone(),
                ));
                *live = Some(Live { cancel, reader });
                debug!(endpoint = %self.endpoint, "change feed connected");
            }
            Err(e) => {
                debug!(error = %e, endpoint = %self.endpoint, "change feed handshake failed");
                self.state.set_if_changed(ConnectionState::Disconnected);
            }
        }
    }

    /// Close the feed if open. Safe to call any number of times; the state
    /// store publishes Disconnected at most once per actual transition.
    pub async fn disconnect(&self) {
        let live = self.live.lock().await.take();
        if let Some(live) = live {
            live.cancel.cancel();
            // The reader answers the cancellation with a Close frame,
            // clears shared state, and exits
            let _ = live.reader.await;
        }
        self.state.set_if_changed(ConnectionState::Disconnected);
    }

    /// Empty the event log (subscribers observe the empty snapshot).
    pub fn clear_messages(&self) {
        self.log.clear();
    }

    /// The bounded event log fed by this connection.
    pub fn events(&self) -> &ChangeEventLog {
        &self.log
    }

    /// Observable connection state.
    pub fn state(&self) -> &SubscribableStore<ConnectionState> {
        &self.state
    }

    pub fn current_state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state.get() == ConnectionState::Connected
    }

    /// Frames received but discarded because they did not decode as change
    /// events (includes the backend's welcome greeting).
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn feed_url(&self, token: Option<&str>) -> String {
        let mut url = self.endpoint.trim_end_matches('/').to_string();
        let mut params: Vec<String> = Vec::new();
        if let Some(token) = token {
            params.push(format!("token={}", urlencoding::encode(token)));
        }
        if let Some(table) = &self.table {
            params.push(format!("table={}", urlencoding::encode(table)));
        }
        if !params.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&params.join("&"));
        }
        url
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // No awaiting in Drop: signal the reader and let it unwind on its own.
        // try_lock only contends with the reader's own exit path.
        if let Ok(mut live) = self.live.try_lock() {
            if let Some(live) = live.take() {
                live.cancel.cancel();
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint)
            .field("table", &self.table)
            .field("state", &self.state.get())
            .field("dropped_frames", &self.dropped_frames())
            .finish()
    }
}

/// Drain the socket until cancellation or wire-side closure.
async fn read_frames(
    socket: FeedSocket,
    log: ChangeEventLog,
    state: SubscribableStore<ConnectionState>,
    live: Arc<Mutex<Option<Live>>>,
    dropped: Arc<AtomicU64>,
    cancel: CancellationToken,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => ingest(&log, &dropped, text.as_bytes()),
                Some(Ok(Message::Binary(bytes))) => ingest(&log, &dropped, &bytes),
                Some(Ok(Message::Ping(data))) => {
                    if sink.send(Message::Pong(data)).await.is_err() {
                        debug!("change feed pong failed, closing");
                        break;
                    }
                }
                Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    debug!("change feed closed by server");
                    break;
                }
                // Raw frames never surface from a read
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "change feed transport error");
                    break;
                }
            }
        }
    }

    // Clear the slot before publishing Disconnected so a caller reacting to
    // the transition can connect() again immediately
    live.lock().await.take();
    state.set_if_changed(ConnectionState::Disconnected);
}

/// Append a frame to the log if it decodes as a change event, drop it
/// otherwise. Malformed frames never kill the connection.
fn ingest(log: &ChangeEventLog, dropped: &AtomicU64, raw: &[u8]) {
    match serde_json::from_slice::<ChangeEvent>(raw) {
        Ok(event) => log.append(event),
        Err(e) => {
            dropped.fetch_add(1, Ordering::Relaxed);
            debug!(error = %e, "dropping malformed feed frame");
        }
    }
}

// ======================================================================
// Tests
// ======================================================================
