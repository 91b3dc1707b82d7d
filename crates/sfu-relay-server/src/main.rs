use anyhow::Result;
use sfu_relay_server::state;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sfu_relay_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SFU signaling relay...");

    // Load configuration
    let config = state::Config::load()?;
    tracing::info!(
        "Proxying to SFU at {} (connect timeout {:?})",
        config.sfu.url,
        config.sfu.connect_timeout
    );

    // Build the router
    let app = sfu_relay_server::create_app(config.clone());

    // Start the server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!("Listening on {}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
