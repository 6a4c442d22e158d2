//! Wire types for the stdio JSON-RPC exchange with the vigil-mcp server.
//!
//! The bridge writes exactly one request line and scans the child's stdout
//! for a response envelope with the matching id. Everything else on the
//! stream (handshake notifications, stray logs) is non-protocol noise.

use serde::{Deserialize, Serialize};

const JSONRPC_VERSION: &str = "2.0";
const TOOLS_CALL_METHOD: &str = "tools/call";

/// One `tools/call` request, serialized as a single newline-terminated line.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRequest {
    jsonrpc: &'static str,
    pub id: u64,
    method: &'static str,
    params: ToolCallParams,
}

#[derive(Debug, Clone, Serialize)]
struct ToolCallParams {
    name: String,
    arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(id: u64, tool: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: TOOLS_CALL_METHOD,
            params: ToolCallParams {
                name: tool.into(),
                arguments,
            },
        }
    }

    /// Serialize to the single line the child reads before EOF.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// One line of child output decoded as a JSON-RPC envelope.
///
/// All fields default so that partial envelopes (notifications, handshake
/// messages) still decode - matching is done on `id` plus `result` or
/// `error`, not on decode success alone.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<ToolOutcome>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}

/// The `result` object of a matched envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolOutcome {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

/// One entry of the result's `content` array. The first entry's `text`
/// field holds the JSON-encoded final output.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(default)]
    pub text: Option<String>,
}

impl ToolOutcome {
    /// Text of the first content block, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().and_then(|block| block.text.as_deref())
    }
}
