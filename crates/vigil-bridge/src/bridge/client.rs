//! Call orchestrator: frame, run, demultiplex - one typed outcome per call.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::demux;
use super::protocol::ToolCallRequest;
use super::supervisor::{McpServerConfig, ProcessSupervisor};
use super::CallError;

/// Seam between the HTTP layer and the subprocess bridge, mockable in
/// route tests.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Execute one tool call against a fresh child process.
    ///
    /// Either yields a fully decoded tool payload or a single typed
    /// failure - never a mixture.
    async fn invoke(
        &self,
        tool: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, CallError>;
}

/// Client for the vigil-mcp server. Stateless across calls: every call is
/// an independent child-process invocation; only the correlation id
/// counter is shared.
pub struct McpClient {
    supervisor: ProcessSupervisor,
    next_id: AtomicU64,
}

impl McpClient {
    pub fn new(config: McpServerConfig) -> Self {
        Self {
            supervisor: ProcessSupervisor::new(config),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl ToolInvoker for McpClient {
    async fn invoke(
        &self,
        tool: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = ToolCallRequest::new(id, tool, arguments)
            .to_line()
            .map_err(|e| CallError::Process(format!("failed to encode request: {e}")))?;

        tracing::info!(tool, call_id = id, "Invoking MCP tool");
        let stdout = self.supervisor.run(&frame).await?;
        let payload = demux::demux(&stdout, id)?;
        tracing::debug!(tool, call_id = id, "Tool call completed");
        Ok(payload)
    }
}
