//! vigil-bridge: HTTP bridge for the vigil-mcp scanning and signing server.
//!
//! Exposes the vigil-mcp MCP server over HTTP. Each inbound call spawns the
//! server as a fresh subprocess, drives it over line-delimited JSON-RPC on
//! stdin/stdout, and maps every failure mode to a typed HTTP response.
//! Signing keys never leave the server side.

pub mod admission;
pub mod bridge;
pub mod config;
pub mod health;
pub mod transport;
mod version;

pub use admission::{ApiKeySet, AuthError, Identity, RateLimiter, RetryAfter};
pub use bridge::{CallError, McpClient, McpServerConfig, ToolInvoker};
pub use config::{Config, ConfigError};
pub use version::VIGIL_BRIDGE_VERSION;
