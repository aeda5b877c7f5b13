//! Authenticated client for the backend's REST and GraphQL surface
//!
//! This module provides:
//! - `ApiClient` — token-aware request builder with uniform error handling
//! - `Page`, `RecordPage`, `TableInfo`, `ColumnInfo` — wire types

mod client;
mod types;

pub use client::ApiClient;
pub use types::{ColumnInfo, Page, RecordPage, TableInfo};
