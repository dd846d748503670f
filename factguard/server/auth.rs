use std::{collections::BTreeMap, fmt};

use axum::http::{header::AUTHORIZATION, HeaderMap};

/// Resolves a bearer token to the user it was issued to.
pub trait Authenticator: Send + Sync {
    /// Returns the user id for `token`, or `None` when the caller is unknown.
    fn authenticate(&self, token: Option<&str>) -> Option<String>;
}

/// Authenticator backed by a fixed token table.
#[derive(Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: BTreeMap<String, String>,
}

impl StaticTokenAuthenticator {
    /// Creates an authenticator from `token -> user id` pairs.
    #[must_use]
    pub const fn new(tokens: BTreeMap<String, String>) -> Self {
        Self { tokens }
    }

    /// Number of known tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when no caller can authenticate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl fmt::Debug for StaticTokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenAuthenticator")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, token: Option<&str>) -> Option<String> {
        token.and_then(|token| self.tokens.get(token).cloned())
    }
}

/// Extracts the token of an `Authorization: Bearer` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
