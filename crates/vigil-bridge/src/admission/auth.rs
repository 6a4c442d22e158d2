//! API-key authentication against an immutable configured allow-set.

use std::collections::BTreeSet;

/// The identity a call runs as after authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Authenticated with a configured key.
    Key(String),
    /// Admitted without authentication (empty allow-set, explicit opt-in).
    DevMode,
}

impl Identity {
    /// Key used for per-identity rate-limit windows.
    pub fn rate_key(&self) -> &str {
        match self {
            Self::Key(key) => key,
            Self::DevMode => "dev-mode",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing API key")]
    Missing,
    #[error("invalid API key")]
    Invalid,
}

/// Immutable credential allow-set, constructed once from configuration.
///
/// An empty set is an explicit insecure-mode state: `Config` refuses to
/// produce one unless the operator opted in, and every call admitted this
/// way logs a warning. Never a silent fallback.
pub struct ApiKeySet {
    keys: BTreeSet<String>,
}

impl ApiKeySet {
    pub fn new(keys: BTreeSet<String>) -> Self {
        if keys.is_empty() {
            tracing::warn!(
                "Running WITHOUT API key authentication (dev mode) - do not use in production"
            );
        }
        Self { keys }
    }

    pub fn is_insecure(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check the presented credential against the allow-set.
    pub fn authorize(&self, presented: Option<&str>) -> Result<Identity, AuthError> {
        if self.keys.is_empty() {
            tracing::warn!("Admitting unauthenticated request (dev mode)");
            return Ok(Identity::DevMode);
        }
        let key = presented.ok_or(AuthError::Missing)?;
        if self.keys.contains(key) {
            Ok(Identity::Key(key.to_string()))
        } else {
            Err(AuthError::Invalid)
        }
    }
}
