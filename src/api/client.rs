//! Token-aware HTTP client for the REST and GraphQL surface

use super::types::{Page, RecordPage, TableInfo};
use crate::error::{ApiError, Result};
use crate::session::Session;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one backend.
///
/// Construction fixes the base URL and (optionally) the bearer token; the
/// client itself never mutates auth state — callers own the token
/// lifecycle. Every method normalizes failures into [`ApiError`]: no raw
/// `reqwest::Error` ever escapes as the public error type.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Client for `base_url` (scheme + host + optional port, no trailing
    /// path) with the default timeout and no token.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Client configured from the console config (URL, timeout, token).
    pub fn from_config(config: &crate::Config) -> Result<Self> {
        let mut client = Self::with_timeout(
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        client.token = config.token.clone();
        Ok(client)
    }

    /// Attach a bearer token to every subsequent request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Authenticate against `POST /api/login`.
    ///
    /// Stateless with respect to this client: the returned session is the
    /// caller's to store, the client keeps whatever token it was built with.
    /// Rejected credentials surface as [`ApiError::Auth`] carrying the
    /// backend's own message.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let body = serde_json::json!({ "username": username, "password": password });
        self.send_json(self.request(Method::POST, "/api/login").json(&body))
            .await
    }

    /// Execute a GraphQL query via `POST /graphql`.
    ///
    /// Returns the full response envelope. An envelope with a non-empty
    /// `errors` array fails with the first error's message; the HTTP layer
    /// may still have answered 200 in that case, so the error carries no
    /// status.
    pub async fn graphql(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let mut body = serde_json::json!({ "query": query });
        if let Some(variables) = variables {
            body["variables"] = variables;
        }
        let envelope: serde_json::Value = self
            .send_json(self.request(Method::POST, "/graphql").json(&body))
            .await?;
        if let Some(first) = envelope
            .get("errors")
            .and_then(|errors| errors.as_array())
            .and_then(|errors| errors.first())
        {
            let message = first
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("GraphQL query failed")
                .to_string();
            debug!(message = %message, "GraphQL error payload");
            return Err(ApiError::Request {
                status: None,
                message,
            });
        }
        Ok(envelope)
    }

    /// List table names via `GET /api/tables`.
    ///
    /// Tolerates both the bare array and the `{"tables": [...]}` wrapper.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let payload: TablesPayload = self
            .send_json(self.request(Method::GET, "/api/tables"))
            .await?;
        Ok(match payload {
            TablesPayload::Bare(tables) => tables,
            TablesPayload::Wrapped { tables } => tables,
        })
    }

    /// Schema descriptor via `GET /api/tables/{table}`.
    /// Unknown tables surface as [`ApiError::NotFound`].
    pub async fn table_info(&self, table: &str) -> Result<TableInfo> {
        let path = format!("/api/tables/{}", urlencoding::encode(table));
        self.send_json(self.request(Method::GET, &path)).await
    }

    /// One page of records via `GET /api/tables/{table}/records`.
    ///
    /// `limit` must be positive; a zero limit is rejected here, before any
    /// network I/O happens.
    ///
    /// # Example
    ///
    /// ```rust
    /// use graphsql_console::{ApiClient, ApiError, Page};
    ///
    /// # tokio_test::block_on(async {
    /// let client = ApiClient::new("http://127.0.0.1:1").unwrap();
    /// let err = client.records("users", Page::new(0, 0)).await.unwrap_err();
    /// assert!(matches!(err, ApiError::Config(_)));
    /// # });
    /// ```
    pub async fn records(&self, table: &str, page: Page) -> Result<RecordPage> {
        if page.limit == 0 {
            return Err(ApiError::Config("limit must be a positive integer".into()));
        }
        let path = format!(
            "/api/tables/{}/records?limit={}&offset={}",
            urlencoding::encode(table),
            page.limit,
            page.offset
        );
        self.send_json(self.request(Method::GET, &path)).await
    }

    /// Backend counters via `GET /api/stats`.
    pub async fn stats(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        self.send_json(self.request(Method::GET, "/api/stats"))
            .await
    }

    /// Liveness via `GET /api/health`. The backend answers 503 when
    /// unhealthy; that normalizes like any other non-2xx.
    pub async fn health(&self) -> Result<serde_json::Value> {
        self.send_json(self.request(Method::GET, "/api/health"))
            .await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let response = req.send().await?;
        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TablesPayload {
    Bare(Vec<String>),
    Wrapped { tables: Vec<String> },
}

/// Pass 2xx responses through, classify everything else by status with the
/// best message the body offers.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_status(
        status.as_u16(),
        extract_message(status, &body),
    ))
}

/// Best-effort human message from an error body: the `detail` (FastAPI),
/// `error`, or `message` key of a JSON body, then the raw text, then the
/// status line.
fn extract_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "error", "message"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    format!("HTTP {status}")
}

// ======================================================================
// Tests
// ======================================================================
