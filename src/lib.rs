//! GraphSQL admin console core
//!
//! Client-side building blocks for administering a GraphSQL backend:
//! - `SubscribableStore` — observable values for reactive console state
//! - `feed` — realtime change feed: WebSocket client plus a bounded,
//!   observable event log
//! - `api` — authenticated REST/GraphQL client with uniform error handling
//! - `session` — session-token plumbing (the token itself stays opaque)
//!
//! The `gsql` binary wires these together into a small terminal console.

pub mod api;
pub mod error;
pub mod feed;
pub mod session;
pub mod store;

pub use api::{ApiClient, ColumnInfo, Page, RecordPage, TableInfo};
pub use error::{ApiError, Result};
pub use feed::{ChangeEvent, ChangeEventLog, ChangeKind, ConnectionManager, ConnectionState};
pub use session::{token_from_cookie, Session, TOKEN_COOKIE};
pub use store::{SubscribableStore, Subscription};

use serde::Deserialize;
use std::path::Path;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub api: ApiYamlConfig,
    pub feed: FeedYamlConfig,
    pub auth: AuthYamlConfig,
}

/// REST/GraphQL endpoint section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiYamlConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiYamlConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            request_timeout_secs: 30,
        }
    }
}

/// Change-feed section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedYamlConfig {
    /// Explicit WebSocket URL; derived from the API base URL when absent
    pub ws_url: Option<String>,
    /// Events retained by the feed log
    pub capacity: usize,
    /// Scope the feed to one table
    pub table: Option<String>,
}

impl Default for FeedYamlConfig {
    fn default() -> Self {
        Self {
            ws_url: None,
            capacity: feed::DEFAULT_CAPACITY,
            table: None,
        }
    }
}

/// Auth section — a pre-issued token for non-interactive use
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthYamlConfig {
    pub token: Option<String>,
}

// ============================================================================
// Runtime config (what the clients actually use)
// ============================================================================

/// Console configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub ws_url: Option<String>,
    pub request_timeout_secs: u64,
    pub feed_capacity: usize,
    pub feed_table: Option<String>,
    pub token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env
    /// vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. A missing or
    /// unparsable file falls back to env vars / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let config = Self {
            base_url: std::env::var("GRAPHSQL_URL").unwrap_or(yaml.api.base_url),
            ws_url: std::env::var("GRAPHSQL_WS_URL").ok().or(yaml.feed.ws_url),
            request_timeout_secs: std::env::var("GRAPHSQL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.api.request_timeout_secs),
            feed_capacity: std::env::var("GRAPHSQL_FEED_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.feed.capacity),
            feed_table: std::env::var("GRAPHSQL_FEED_TABLE")
                .ok()
                .or(yaml.feed.table),
            token: std::env::var("GRAPHSQL_TOKEN").ok().or(yaml.auth.token),
        };

        if config.feed_capacity == 0 {
            return Err(ApiError::Config(
                "feed capacity must be a positive integer".into(),
            ));
        }

        Ok(config)
    }

    /// WebSocket endpoint for the change feed: the configured override, or
    /// the API base URL with the scheme swapped (`http→ws`, `https→wss`)
    /// plus the conventional `/ws` path.
    pub fn feed_url(&self) -> String {
        if let Some(ws_url) = &self.ws_url {
            return ws_url.clone();
        }
        let base = self.base_url.trim_end_matches('/');
        let swapped = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        format!("{swapped}/ws")
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let yaml = YamlConfig::default();
        Self {
            base_url: yaml.api.base_url,
            ws_url: yaml.feed.ws_url,
            request_timeout_secs: yaml.api.request_timeout_secs,
            feed_capacity: yaml.feed.capacity,
            feed_table: yaml.feed.table,
            token: yaml.auth.token,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_config_loading() {
        let yaml = r#"
api:
  base_url: http://db-admin:9000
  request_timeout_secs: 5

feed:
  ws_url: ws://db-admin:9000/ws
  capacity: 50
  table: users

auth:
  token: "pre-issued-token"
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api.base_url, "http://db-admin:9000");
        assert_eq!(config.api.request_timeout_secs, 5);
        assert_eq!(config.feed.ws_url.as_deref(), Some("ws://db-admin:9000/ws"));
        assert_eq!(config.feed.capacity, 50);
        assert_eq!(config.feed.table.as_deref(), Some("users"));
        assert_eq!(config.auth.token.as_deref(), Some("pre-issued-token"));
    }

    #[test]
    fn test_yaml_defaults() {
        let config = YamlConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.request_timeout_secs, 30);
        assert!(config.feed.ws_url.is_none());
        assert_eq!(config.feed.capacity, feed::DEFAULT_CAPACITY);
        assert!(config.auth.token.is_none());
    }

    #[test]
    fn test_feed_url_derived_from_base() {
        let config = Config {
            base_url: "http://localhost:8000".into(),
            ..Config::default()
        };
        assert_eq!(config.feed_url(), "ws://localhost:8000/ws");

        let config = Config {
            base_url: "https://db.example.com/".into(),
            ..Config::default()
        };
        assert_eq!(config.feed_url(), "wss://db.example.com/ws");
    }

    #[test]
    fn test_feed_url_explicit_override_wins() {
        let config = Config {
            base_url: "http://localhost:8000".into(),
            ws_url: Some("wss://feed.example.com/stream".into()),
            ..Config::default()
        };
        assert_eq!(config.feed_url(), "wss://feed.example.com/stream");
    }

    /// Combined test for YAML file loading, env var overrides, and
    /// validation. Runs as a single test to avoid parallel env var races.
    #[test]
    fn test_yaml_and_env_lifecycle() {
        fn clear_env() {
            for var in &[
                "GRAPHSQL_URL",
                "GRAPHSQL_WS_URL",
                "GRAPHSQL_TIMEOUT_SECS",
                "GRAPHSQL_FEED_CAPACITY",
                "GRAPHSQL_FEED_TABLE",
                "GRAPHSQL_TOKEN",
            ] {
                std::env::remove_var(var);
            }
        }

        // --- Phase 1: YAML values loaded correctly ---
        let yaml = r#"
api:
  base_url: http://yaml-host:8000
  request_timeout_secs: 10
feed:
  capacity: 25
auth:
  token: yaml-token
"#;
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        clear_env();

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.base_url, "http://yaml-host:8000");
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.feed_capacity, 25);
        assert_eq!(config.token.as_deref(), Some("yaml-token"));
        // Derived, since the file sets no ws_url
        assert_eq!(config.feed_url(), "ws://yaml-host:8000/ws");

        // --- Phase 2: Env vars override YAML ---
        std::env::set_var("GRAPHSQL_URL", "http://env-host:9000");
        std::env::set_var("GRAPHSQL_FEED_CAPACITY", "75");
        std::env::set_var("GRAPHSQL_TOKEN", "env-token");

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.base_url, "http://env-host:9000");
        assert_eq!(config.feed_capacity, 75);
        assert_eq!(config.token.as_deref(), Some("env-token"));
        // YAML value still used where no env override
        assert_eq!(config.request_timeout_secs, 10);

        // --- Phase 3: Zero capacity rejected ---
        std::env::set_var("GRAPHSQL_FEED_CAPACITY", "0");
        let err = Config::from_yaml_and_env(Some(&file_path)).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));

        clear_env();

        // --- Phase 4: No YAML file → defaults ---
        let nonexistent = Path::new("/tmp/nonexistent-gsql-config-12345.yaml");
        let config = Config::from_yaml_and_env(Some(nonexistent)).unwrap();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.feed_capacity, feed::DEFAULT_CAPACITY);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_unparsable_yaml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(b"api: [this is not a mapping").unwrap();

        let yaml = Config::load_yaml(Some(&file_path));
        assert_eq!(yaml.api.base_url, "http://localhost:8000");
    }
}
