//! Response demultiplexer: find the one envelope that answers the call.
//!
//! The child's stdout may interleave handshake noise, notifications, and
//! the real response. The rules, each independently testable:
//! - lines that fail to decode are noise, silently skipped;
//! - envelopes with the wrong id, or the right id but neither `result`
//!   nor `error`, are non-matches and scanning continues;
//! - the first envelope with the matching id and a `result` wins;
//! - a matching-id `error` envelope terminates the scan with the
//!   server-supplied diagnostic;
//! - no match by end of stream is a protocol parse failure.

use super::CallError;
use super::protocol::{Envelope, RpcError, ToolOutcome};

/// Classification of a single output line against the outstanding call.
#[derive(Debug)]
pub enum LineScan {
    /// Not a protocol envelope (bad JSON, or not an object).
    Noise,
    /// A well-formed envelope that does not answer this call.
    Unmatched(Envelope),
    /// The response for the outstanding call.
    Matched(Envelope),
    /// The server answered this call with a JSON-RPC error.
    Failed(RpcError),
}

pub fn scan_line(line: &str, call_id: u64) -> LineScan {
    let Ok(envelope) = serde_json::from_str::<Envelope>(line) else {
        return LineScan::Noise;
    };
    if envelope.id != Some(call_id) {
        return LineScan::Unmatched(envelope);
    }
    if envelope.result.is_some() {
        LineScan::Matched(envelope)
    } else if let Some(error) = envelope.error {
        LineScan::Failed(error)
    } else {
        LineScan::Unmatched(envelope)
    }
}

/// Scan the full output stream for the envelope answering `call_id`.
pub fn find_response(output: &str, call_id: u64) -> Result<Envelope, CallError> {
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match scan_line(line, call_id) {
            LineScan::Matched(envelope) => return Ok(envelope),
            LineScan::Failed(error) => {
                return Err(CallError::Process(format!(
                    "RPC error {}: {}",
                    error.code, error.message
                )));
            }
            LineScan::Noise | LineScan::Unmatched(_) => continue,
        }
    }
    Err(CallError::ProtocolParse)
}

/// Extract the final tool payload from a matched envelope.
///
/// The payload is one further layer of JSON-encoded text nested in the
/// result's first content block; failing to decode it is a payload
/// failure, distinct from outer envelope parsing.
pub fn extract_payload(outcome: &ToolOutcome) -> Result<serde_json::Value, CallError> {
    if outcome.is_error {
        let message = outcome
            .first_text()
            .unwrap_or("Unknown error")
            .to_string();
        return Err(CallError::ToolExecution(message));
    }

    if outcome.content.is_empty() {
        return Err(CallError::PayloadDecode(
            "no content in tool response".to_string(),
        ));
    }

    let text = outcome.first_text().ok_or_else(|| {
        CallError::PayloadDecode("first content block has no text".to_string())
    })?;

    serde_json::from_str(text).map_err(|e| CallError::PayloadDecode(e.to_string()))
}

/// Full demultiplex: scan the stream, then decode the matched payload.
pub fn demux(output: &str, call_id: u64) -> Result<serde_json::Value, CallError> {
    let envelope = find_response(output, call_id)?;
    // Matched envelopes always carry a result; scan_line guarantees it.
    let outcome = envelope.result.as_ref().ok_or(CallError::ProtocolParse)?;
    extract_payload(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response_line(id: u64, payload: &serde_json::Value) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "content": [{"type": "text", "text": payload.to_string()}]
            }
        })
        .to_string()
    }

    #[test]
    fn noise_lines_are_skipped() {
        let output = format!(
            "vigil-mcp server starting...\nnot json at all\n{}\n",
            response_line(1, &json!({"ok": true}))
        );

        let value = demux(&output, 1).unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[test]
    fn handshake_envelopes_before_response_are_skipped() {
        let output = format!(
            "{}\n{}\n",
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            response_line(1, &json!({"findings": []}))
        );

        let value = demux(&output, 1).unwrap();
        assert_eq!(value, json!({"findings": []}));
    }

    #[test]
    fn wrong_id_is_not_a_match() {
        let output = format!("{}\n", response_line(2, &json!({})));
        assert!(matches!(demux(&output, 1), Err(CallError::ProtocolParse)));
    }

    #[test]
    fn right_id_without_result_keeps_scanning() {
        // An ambiguous partial match (right id, no result) must not stop
        // the scan; the real response follows.
        let output = format!(
            "{}\n{}\n",
            json!({"jsonrpc": "2.0", "id": 1}),
            response_line(1, &json!({"ok": 1}))
        );

        let value = demux(&output, 1).unwrap();
        assert_eq!(value, json!({"ok": 1}));
    }

    #[test]
    fn first_matching_envelope_wins() {
        let output = format!(
            "{}\n{}\n",
            response_line(1, &json!({"first": true})),
            response_line(1, &json!({"second": true}))
        );

        let value = demux(&output, 1).unwrap();
        assert_eq!(value, json!({"first": true}));
    }

    #[test]
    fn empty_and_blank_lines_are_ignored() {
        let output = format!("\n   \n{}\n\n", response_line(1, &json!(42)));
        assert_eq!(demux(&output, 1).unwrap(), json!(42));
    }

    #[test]
    fn rpc_error_envelope_surfaces_diagnostic() {
        let output = format!(
            "{}\n{}\n",
            json!({"jsonrpc": "2.0", "id": 2, "error": {"code": -1, "message": "other call"}}),
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "method not found"}}),
        );

        match demux(&output, 1) {
            Err(CallError::Process(msg)) => {
                assert!(msg.contains("-32601"));
                assert!(msg.contains("method not found"));
            }
            other => panic!("expected Process, got {other:?}"),
        }
    }

    #[test]
    fn no_match_is_protocol_parse_failure() {
        assert!(matches!(
            demux("just some logs\n", 1),
            Err(CallError::ProtocolParse)
        ));
    }

    #[test]
    fn tool_error_surfaces_supplied_message() {
        let output = json!({
            "id": 1,
            "result": {"isError": true, "content": [{"text": "scan failed: no route to host"}]}
        })
        .to_string();

        match demux(&output, 1) {
            Err(CallError::ToolExecution(msg)) => {
                assert_eq!(msg, "scan failed: no route to host");
            }
            other => panic!("expected ToolExecution, got {other:?}"),
        }
    }

    #[test]
    fn tool_error_without_content_is_generic() {
        let output = json!({"id": 1, "result": {"isError": true, "content": []}}).to_string();

        match demux(&output, 1) {
            Err(CallError::ToolExecution(msg)) => assert_eq!(msg, "Unknown error"),
            other => panic!("expected ToolExecution, got {other:?}"),
        }
    }

    #[test]
    fn missing_content_is_payload_failure() {
        let output = json!({"id": 1, "result": {"content": []}}).to_string();
        assert!(matches!(
            demux(&output, 1),
            Err(CallError::PayloadDecode(_))
        ));
    }

    #[test]
    fn malformed_inner_payload_is_payload_failure() {
        let output = json!({
            "id": 1,
            "result": {"content": [{"text": "{not valid json"}]}
        })
        .to_string();

        assert!(matches!(
            demux(&output, 1),
            Err(CallError::PayloadDecode(_))
        ));
    }

    #[test]
    fn nested_payload_round_trips_without_truncation() {
        let payload = json!({
            "timestamp": "2025-01-01T00:00:00Z",
            "findings": {
                "open_ports": [{"port": 22, "service": "ssh"}, {"port": 443, "service": "https"}],
                "file_findings": [{"path": "/etc/shadow", "issue": {"severity": "high", "tags": ["perm", "acl"]}}]
            },
            "summary": {"risk_level": "medium", "total_findings": 3}
        });

        let output = format!("noise\n{}\n", response_line(9, &payload));
        assert_eq!(demux(&output, 9).unwrap(), payload);
    }
}
