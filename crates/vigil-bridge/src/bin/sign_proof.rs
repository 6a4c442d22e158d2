//! Standalone signing helper: reads a JSON payload from argv, emits an
//! ed25519 proof document on stdout. Errors go to stderr as JSON with a
//! non-zero exit, so callers can distinguish a proof from a failure
//! without parsing free-form text.

use std::process;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64;
use ed25519_dalek::{Signer, SigningKey};
use serde_json::json;

const SIGNING_KEY_ENV: &str = "VIGIL_SIGNING_KEY";

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let Some(payload_arg) = args.get(1) else {
        fail("Missing required argument: payload");
    };
    if args.len() > 2 {
        fail("Unexpected extra arguments");
    }

    match run(payload_arg) {
        Ok(proof) => println!("{proof}"),
        Err(msg) => fail(&msg),
    }
}

fn fail(msg: &str) -> ! {
    eprintln!("{}", json!({ "error": msg }));
    process::exit(1);
}

fn run(payload_arg: &str) -> Result<String, String> {
    let payload: serde_json::Value =
        serde_json::from_str(payload_arg).map_err(|e| format!("Invalid JSON: {e}"))?;

    let encoded = std::env::var(SIGNING_KEY_ENV)
        .map_err(|_| format!("{SIGNING_KEY_ENV} is not set"))?;
    let key = decode_signing_key(&encoded)?;

    let proof = sign_payload(&key, &payload)?;
    serde_json::to_string(&proof).map_err(|e| format!("Failed to encode proof: {e}"))
}

/// Decode a base64-encoded 32-byte ed25519 seed.
fn decode_signing_key(encoded: &str) -> Result<SigningKey, String> {
    let bytes = Base64
        .decode(encoded.trim())
        .map_err(|_| format!("{SIGNING_KEY_ENV} is not valid base64"))?;
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("{SIGNING_KEY_ENV} must decode to 32 bytes"))?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Sign the canonical compact serialization of the payload.
///
/// `serde_json` orders object keys, so re-serializing the parsed value
/// yields the same bytes for semantically equal payloads.
fn sign_payload(
    key: &SigningKey,
    payload: &serde_json::Value,
) -> Result<serde_json::Value, String> {
    let message =
        serde_json::to_vec(payload).map_err(|e| format!("Failed to canonicalize payload: {e}"))?;
    let signature = key.sign(&message);

    Ok(json!({
        "algorithm": "ed25519",
        "signature": Base64.encode(signature.to_bytes()),
        "public_key": Base64.encode(key.verifying_key().to_bytes()),
        "signed_at": chrono::Utc::now().to_rfc3339(),
    }))
}
