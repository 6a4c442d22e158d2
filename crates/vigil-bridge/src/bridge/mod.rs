//! Subprocess RPC bridge to the vigil-mcp server.
//!
//! One child process per call: spawn, write one framed JSON-RPC request,
//! read the (possibly noisy) response stream back, correlate by id, and
//! guarantee the child is terminated before the call returns.

pub mod client;
pub mod demux;
pub mod protocol;
pub mod supervisor;

pub use client::{McpClient, ToolInvoker};
pub use supervisor::{McpServerConfig, ProcessSupervisor};

/// Every way a tool call can fail.
///
/// Nothing escapes the bridge as an unstructured fault; the HTTP layer maps
/// each variant to exactly one status code.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The server binary could not be located or executed. Never retried.
    #[error("MCP server not found at {path}; ensure vigil-mcp is installed")]
    ToolUnavailable { path: String },

    /// The deadline elapsed before the child finished. The child has been
    /// killed and reaped; any partial output is discarded. Sub-second
    /// deadlines round up to one second.
    #[error("tool execution timed out after {0} seconds")]
    Timeout(u64),

    /// The child exited non-zero, or I/O to it failed. Carries the
    /// diagnostic stream's content when available.
    #[error("MCP server error: {0}")]
    Process(String),

    /// Zero exit but nothing on stdout. Never treated as "no findings".
    #[error("empty response from MCP server")]
    EmptyResponse,

    /// No envelope in the output stream matched the outstanding call.
    #[error("could not parse MCP response")]
    ProtocolParse,

    /// The tool itself reported an error inside a well-formed envelope.
    #[error("tool execution error: {0}")]
    ToolExecution(String),

    /// The matched envelope's inner payload was not valid JSON.
    #[error("failed to decode tool payload: {0}")]
    PayloadDecode(String),
}
