use std::sync::Arc;

use tokio::net::TcpListener;

use gazette_server::config::{generate_config_template, Config};
use gazette_server::routes;
use gazette_server::state::AppState;
use gazette_server::ws::hub::Hub;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "gazette_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "gazette_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Gazette realtime server v{} starting", env!("CARGO_PKG_VERSION"));

    // The hub lives for the process lifetime; state is in-memory only and
    // dropped on shutdown.
    let hub = Arc::new(Hub::new());

    let app_state = AppState {
        hub,
        ws: config.ws.clone(),
    };

    let app = routes::build_router(app_state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
