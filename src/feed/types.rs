//! Change-feed event types decoded from WebSocket frames

use chrono::TimeZone;
use serde::{Deserialize, Serialize};

/// The kind of table mutation a frame announces
///
/// Unknown kind strings decode to `Other` so new backend event types
/// flow through instead of being dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // f.pad so column alignment in the CLI works
        let label = match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
            ChangeKind::Other => "other",
        };
        f.pad(label)
    }
}

/// Liveness of the change-feed connection
///
/// Legal transitions: Disconnected → Connecting → Connected → Disconnected,
/// plus Connecting → Disconnected on a failed handshake. Only the owning
/// `ConnectionManager` writes this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// One table-change notification from the backend
///
/// A frame must carry `type`, `table`, and an integer epoch-millis
/// `timestamp` to qualify; anything else (including the backend's
/// `{"type":"welcome",...}` greeting, which has no timestamp) fails
/// decoding and is dropped by the reader. All remaining frame fields are
/// kept opaquely in `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The mutation kind (`type` on the wire)
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Table the change applies to
    pub table: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Whatever else the backend sent (record data, channel info, ...)
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, table: impl Into<String>, timestamp: i64) -> Self {
        Self {
            kind,
            table: table.into(),
            timestamp,
            payload: serde_json::Map::new(),
        }
    }

    /// Attach one payload field (builder style, mainly for tests)
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Timestamp rendered as local wall-clock time (falls back to the raw
    /// millis when out of chrono's range)
    pub fn local_time(&self) -> String {
        chrono::Local
            .timestamp_millis_opt(self.timestamp)
            .single()
            .map(|dt| dt.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}

// ======================================================================
// Tests
// ======================================================================
