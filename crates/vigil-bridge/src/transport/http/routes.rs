//! HTTP route handlers.
//!
//! The single place where typed admission and call failures become
//! transport-facing responses. Diagnostic messages stay distinguishable;
//! raw faults never leak.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};

use crate::admission::{ApiKeySet, Identity, RateLimiter};
use crate::bridge::{CallError, McpClient, McpServerConfig, ToolInvoker};
use crate::config::Config;
use crate::health;
use crate::version::VIGIL_BRIDGE_VERSION;

use super::models::{ErrorBody, ScanRequest, ScanResult, SignedScanResponse};

const API_KEY_HEADER: &str = "x-api-key";

/// Shared state behind every handler.
pub struct BridgeState {
    pub invoker: Arc<dyn ToolInvoker>,
    pub auth: ApiKeySet,
    pub scan_limiter: RateLimiter,
    pub signed_limiter: RateLimiter,
    pub config: Config,
}

impl BridgeState {
    /// Production wiring: a real subprocess client built from config.
    pub fn new(config: Config) -> Arc<Self> {
        let invoker = Arc::new(McpClient::new(McpServerConfig {
            command: config.node_command.clone(),
            server_path: config.server_path.clone(),
            timeout: config.scan_timeout,
        }));
        Self::with_invoker(config, invoker)
    }

    /// Wiring with an explicit invoker (tests swap in a mock here).
    pub fn with_invoker(config: Config, invoker: Arc<dyn ToolInvoker>) -> Arc<Self> {
        Arc::new(Self {
            auth: ApiKeySet::new(config.api_keys.clone()),
            scan_limiter: RateLimiter::per_minute(config.scan_quota),
            signed_limiter: RateLimiter::per_minute(config.signed_scan_quota),
            invoker,
            config,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum ScanKind {
    Plain,
    Signed,
}

impl ScanKind {
    fn tool(self) -> &'static str {
        match self {
            Self::Plain => "vigil.scan",
            Self::Signed => "vigil.scan.signed",
        }
    }
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok())
}

fn error_response(status: StatusCode, body: ErrorBody) -> Response {
    (status, Json(body)).into_response()
}

fn validation_response(field: &str, msg: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(serde_json::json!({
            "detail": [{
                "loc": ["body", field],
                "msg": msg,
                "type": "value_error"
            }]
        })),
    )
        .into_response()
}

fn call_error_response(error: &CallError) -> Response {
    let status = match error {
        CallError::ToolUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        CallError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CallError::Process(_)
        | CallError::EmptyResponse
        | CallError::ProtocolParse
        | CallError::ToolExecution(_)
        | CallError::PayloadDecode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, ErrorBody::new(error.to_string()))
}

fn authenticate(state: &BridgeState, headers: &HeaderMap) -> Result<Identity, Response> {
    state
        .auth
        .authorize(presented_key(headers))
        .map_err(|e| error_response(StatusCode::UNAUTHORIZED, ErrorBody::new(e.to_string())))
}

/// Charge one unit of the endpoint's quota. Runs after body validation:
/// a request rejected as malformed consumes nothing.
fn charge_quota(state: &BridgeState, identity: &Identity, kind: ScanKind) -> Result<(), Response> {
    let limiter = match kind {
        ScanKind::Plain => &state.scan_limiter,
        ScanKind::Signed => &state.signed_limiter,
    };
    if let Err(retry) = limiter.check(identity.rate_key()) {
        tracing::warn!(
            identity = identity.rate_key(),
            tool = kind.tool(),
            "Rate limit exceeded"
        );
        let mut response = error_response(
            StatusCode::TOO_MANY_REQUESTS,
            ErrorBody::new("Rate limit exceeded"),
        );
        if let Ok(value) = retry.header_secs().to_string().parse() {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        return Err(response);
    }
    Ok(())
}

async fn handle_scan(
    state: Arc<BridgeState>,
    headers: HeaderMap,
    request: ScanRequest,
    kind: ScanKind,
) -> Response {
    let identity = match authenticate(&state, &headers) {
        Ok(identity) => identity,
        Err(denied) => return denied,
    };

    if let Err(e) = request.validate() {
        return validation_response(e.field, &e.msg);
    }

    if let Err(denied) = charge_quota(&state, &identity, kind) {
        return denied;
    }

    let arguments = match serde_json::to_value(&request) {
        Ok(v) => v,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new("failed to encode scan arguments").with_detail(e.to_string()),
            );
        }
    };

    let payload = match state.invoker.invoke(kind.tool(), arguments).await {
        Ok(payload) => payload,
        Err(e) => return call_error_response(&e),
    };

    // Re-shape the opaque tool payload into the response model.
    match kind {
        ScanKind::Plain => shape::<ScanResult>(payload),
        ScanKind::Signed => shape::<SignedScanResponse>(payload),
    }
}

fn shape<T: serde::de::DeserializeOwned + serde::Serialize>(payload: serde_json::Value) -> Response {
    match serde_json::from_value::<T>(payload) {
        Ok(shaped) => (StatusCode::OK, Json(shaped)).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::new("tool returned an unexpected result shape").with_detail(e.to_string()),
        ),
    }
}

async fn scan(
    State(state): State<Arc<BridgeState>>,
    headers: HeaderMap,
    Json(request): Json<ScanRequest>,
) -> Response {
    handle_scan(state, headers, request, ScanKind::Plain).await
}

async fn scan_signed(
    State(state): State<Arc<BridgeState>>,
    headers: HeaderMap,
    Json(request): Json<ScanRequest>,
) -> Response {
    handle_scan(state, headers, request, ScanKind::Signed).await
}

async fn health_check(State(state): State<Arc<BridgeState>>) -> Response {
    let report = health::probe(&state.config).await;
    (StatusCode::OK, Json(report)).into_response()
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "Vigil MCP Bridge",
        "version": VIGIL_BRIDGE_VERSION,
        "description": "HTTP bridge for vigil-mcp security scanning and cryptographic signing",
        "endpoints": {
            "health": "/health",
            "scan": "/scan",
            "scan_signed": "/scan/signed",
            "openapi": "/openapi.json"
        },
        "documentation": "https://github.com/vigil-xy/vigil-mcp"
    }))
}

async fn openapi_schema() -> Json<serde_json::Value> {
    Json(openapi_document())
}

/// Hand-assembled OpenAPI document for the fixed route set.
fn openapi_document() -> serde_json::Value {
    let scan_request_schema = serde_json::json!({
        "type": "object",
        "required": ["target"],
        "properties": {
            "target": {"type": "string", "enum": ["host", "repo"]},
            "repo_url": {"type": "string"},
            "dry_run": {"type": "boolean", "default": true}
        }
    });

    serde_json::json!({
        "openapi": "3.0.2",
        "info": {
            "title": "Vigil MCP Bridge",
            "description": "HTTP bridge for vigil-mcp security scanning and cryptographic signing",
            "version": VIGIL_BRIDGE_VERSION
        },
        "paths": {
            "/scan": {
                "post": {
                    "summary": "Run security scan",
                    "security": [{"ApiKeyAuth": []}],
                    "requestBody": {
                        "content": {"application/json": {"schema": scan_request_schema}}
                    },
                    "responses": {
                        "200": {"description": "Structured scan results"},
                        "401": {"description": "Invalid or missing API key"},
                        "429": {"description": "Rate limit exceeded"}
                    }
                }
            },
            "/scan/signed": {
                "post": {
                    "summary": "Run security scan with cryptographic signature",
                    "security": [{"ApiKeyAuth": []}],
                    "requestBody": {
                        "content": {"application/json": {"schema": scan_request_schema}}
                    },
                    "responses": {
                        "200": {"description": "Scan results with cryptographic proof"},
                        "401": {"description": "Invalid or missing API key"},
                        "429": {"description": "Rate limit exceeded"}
                    }
                }
            },
            "/health": {
                "get": {
                    "summary": "Health check",
                    "responses": {"200": {"description": "Service and dependency status"}}
                }
            }
        },
        "components": {
            "securitySchemes": {
                "ApiKeyAuth": {"type": "apiKey", "in": "header", "name": "X-API-Key"}
            }
        }
    })
}

pub fn routes(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/openapi.json", get(openapi_schema))
        .route("/scan", post(scan))
        .route("/scan/signed", post(scan_signed))
        .with_state(state)
}
