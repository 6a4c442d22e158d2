//! Request and response models for the HTTP surface.
//!
//! The tool payload is opaque JSON to the bridge core; these models
//! re-validate and re-shape it at the HTTP boundary only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Body of `POST /scan` and `POST /scan/signed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Target to scan: `host` or `repo`.
    pub target: String,
    /// Repository URL, required when target is `repo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    /// Run without making changes.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

fn default_dry_run() -> bool {
    true
}

/// A single field-level validation error, rendered FastAPI-style in the
/// 422 body.
#[derive(Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub msg: String,
}

impl ScanRequest {
    pub fn validate(&self) -> Result<(), FieldError> {
        if self.target != "host" && self.target != "repo" {
            return Err(FieldError {
                field: "target",
                msg: "target must be either 'host' or 'repo'".to_string(),
            });
        }
        if self.target == "repo" && self.repo_url.as_deref().unwrap_or("").is_empty() {
            return Err(FieldError {
                field: "repo_url",
                msg: "repo_url is required when target is 'repo'".to_string(),
            });
        }
        Ok(())
    }
}

/// Structured findings from a scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Findings {
    #[serde(default)]
    pub open_ports: Vec<serde_json::Value>,
    #[serde(default)]
    pub file_findings: Vec<serde_json::Value>,
    #[serde(default)]
    pub system_issues: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// Risk level: low, medium, high, critical.
    pub risk_level: String,
    pub total_findings: u64,
}

/// Shaped result of `vigil.scan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub timestamp: String,
    pub target: String,
    pub findings: Findings,
    pub summary: Summary,
    pub raw_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_metadata: Option<BTreeMap<String, String>>,
}

/// Shaped result of `vigil.scan.signed`: scan plus tamper-evident proof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedScanResponse {
    pub scan_result: ScanResult,
    pub cryptographic_proof: serde_json::Value,
    #[serde(default = "default_tamper_evident")]
    pub is_tamper_evident: bool,
}

fn default_tamper_evident() -> bool {
    true
}

/// Uniform error body: `{error, detail?, timestamp}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
