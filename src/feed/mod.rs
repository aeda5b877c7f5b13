//! Realtime change feed: WebSocket client, bounded event log, liveness
//!
//! This module provides:
//! - `ChangeEvent` — typed table-change notifications decoded from frames
//! - `ChangeEventLog` — bounded, observable, insertion-ordered log
//! - `ConnectionManager` — owns the single transport and both stores

mod log;
mod manager;
mod types;

pub use log::{ChangeEventLog, DEFAULT_CAPACITY};
pub use manager::ConnectionManager;
pub use types::{ChangeEvent, ChangeKind, ConnectionState};
