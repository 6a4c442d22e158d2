//! Health probing for `GET /health`.
//!
//! Liveness is implicit (the handler answered); the report adds whether
//! the MCP server module is present and whether each auxiliary tool can
//! be executed, as independent booleans.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;

use crate::config::Config;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Degraded,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: Status,
    pub timestamp: String,
    pub mcp_server_available: bool,
    pub dependencies: BTreeMap<String, bool>,
}

/// Probe the server module and auxiliary tools.
pub async fn probe(config: &Config) -> HealthReport {
    let mcp_server_available = config.server_path.exists();

    let (vigil_scan, sign_proof) = tokio::join!(
        probe_command("vigil-scan", &["--version"]),
        probe_command("sign-proof", &["--version"]),
    );

    let mut dependencies = BTreeMap::new();
    dependencies.insert("vigil-scan".to_string(), vigil_scan);
    dependencies.insert("sign-proof".to_string(), sign_proof);

    HealthReport {
        status: if mcp_server_available {
            Status::Healthy
        } else {
            Status::Degraded
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
        mcp_server_available,
        dependencies,
    }
}

/// A tool counts as present if it can be executed at all within the probe
/// deadline; its exit code is irrelevant.
async fn probe_command(command: &str, args: &[&str]) -> bool {
    let status = Command::new(command)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    matches!(tokio::time::timeout(PROBE_TIMEOUT, status).await, Ok(Ok(_)))
}
