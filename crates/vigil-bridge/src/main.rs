use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use vigil_bridge::transport::BridgeState;
use vigil_bridge::{Config, VIGIL_BRIDGE_VERSION, transport};

/// Initialize tracing with RUST_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("vigil_bridge=info")
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env()?;

    tracing::info!(
        version = VIGIL_BRIDGE_VERSION,
        server_path = %config.server_path.display(),
        timeout_secs = config.scan_timeout.as_secs(),
        api_keys = config.api_keys.len(),
        "Starting Vigil MCP bridge"
    );

    let state = BridgeState::new(config);
    transport::serve(state).await
}
