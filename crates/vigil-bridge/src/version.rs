//! Version information for vigil-bridge.

/// Bridge version from Cargo.toml, reported by `/` and in startup logs.
pub const VIGIL_BRIDGE_VERSION: &str = env!("CARGO_PKG_VERSION");
