//! Session token boundary
//!
//! Tokens are opaque strings: issued by the backend at login, stored by the
//! embedding application (conventionally in the `graphsql_token` cookie),
//! and passed into this crate verbatim. Nothing here decodes or renews them.

use serde::{Deserialize, Serialize};

/// Cookie the admin frontend stores the token under
pub const TOKEN_COOKIE: &str = "graphsql_token";

/// An authenticated session as returned by `POST /api/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    /// Backend-defined user descriptor
    #[serde(default)]
    pub user: serde_json::Value,
}

/// Extract the session token from a `Cookie` header value.
///
/// Returns `None` when the cookie is absent or empty. The value is kept
/// verbatim; callers pass it straight to `ApiClient` or
/// `ConnectionManager::connect`.
pub fn token_from_cookie(header: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        pair.trim()
            .strip_prefix(TOKEN_COOKIE)
            .and_then(|rest| rest.strip_prefix('='))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

// ======================================================================
// Tests
// ======================================================================
