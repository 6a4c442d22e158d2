//! Deployment configuration, read once at startup from the environment.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the vigil-mcp server module inside the deploy image.
pub const DEFAULT_SERVER_PATH: &str = "/app/build/index.js";

const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 300;
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SCAN_QUOTA: u32 = 10;
const DEFAULT_SIGNED_SCAN_QUOTA: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    /// Running without API keys must be an explicit operator decision,
    /// never a silent fallback.
    #[error(
        "no API keys configured; set API_KEYS, or set VIGIL_ALLOW_UNAUTHENTICATED=1 \
         to run without authentication (development only)"
    )]
    NoApiKeys,
}

/// Bridge configuration.
///
/// Immutable after startup - handlers receive it by shared reference, so a
/// misconfigured credential set can only fail loudly at boot, not drift at
/// runtime.
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime used to execute the server module (`node`).
    pub node_command: String,
    /// Path to the vigil-mcp server module.
    pub server_path: PathBuf,
    /// Maximum duration of a single tool call.
    pub scan_timeout: Duration,
    pub host: String,
    pub port: u16,
    /// Accepted caller credentials. Empty only when
    /// `allow_unauthenticated` is set.
    pub api_keys: BTreeSet<String>,
    /// Explicit opt-in for running with an empty key set.
    pub allow_unauthenticated: bool,
    /// Per-key quota per minute for `POST /scan`.
    pub scan_quota: u32,
    /// Per-key quota per minute for `POST /scan/signed` (stricter, signing
    /// is expensive).
    pub signed_scan_quota: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            node_command: "node".to_string(),
            server_path: PathBuf::from(
                std::env::var("MCP_SERVER_PATH")
                    .unwrap_or_else(|_| DEFAULT_SERVER_PATH.to_string()),
            ),
            scan_timeout: Duration::from_secs(parse_var(
                "MAX_SCAN_TIMEOUT",
                DEFAULT_SCAN_TIMEOUT_SECS,
            )?),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", DEFAULT_PORT)?,
            api_keys: parse_api_keys(std::env::var("API_KEYS").ok().as_deref()),
            allow_unauthenticated: std::env::var("VIGIL_ALLOW_UNAUTHENTICATED").as_deref()
                == Ok("1"),
            scan_quota: parse_var("SCAN_RATE_LIMIT", DEFAULT_SCAN_QUOTA)?,
            signed_scan_quota: parse_var("SIGNED_SCAN_RATE_LIMIT", DEFAULT_SIGNED_SCAN_QUOTA)?,
        };
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.api_keys.is_empty() && !self.allow_unauthenticated {
            return Err(ConfigError::NoApiKeys);
        }
        Ok(self)
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

/// Comma-separated keys; whitespace trimmed, empty entries dropped.
fn parse_api_keys(raw: Option<&str>) -> BTreeSet<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
