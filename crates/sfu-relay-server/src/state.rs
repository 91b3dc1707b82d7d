use crate::registry::{ConnectionRegistry, PeerStreamIndex, RoomRegistry};
use crate::relay::Relay;
use crate::ws::connections::Hub;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SFU_CONNECT_TIMEOUT_MS: u64 = 5000;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: String,
    pub sfu: SfuConfig,
    /// Allowed browser origin; any origin when unset
    pub cors_origin: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SfuConfig {
    /// WebSocket URL of the SFU control endpoint
    pub url: String,
    pub connect_timeout: Duration,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        // Pick up a local .env if present
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env loaded: {}", e);
        }

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let url = std::env::var("SFU_URL").unwrap_or_else(|_| {
            tracing::warn!("SFU_URL not set, using ws://127.0.0.1:7000/ws");
            "ws://127.0.0.1:7000/ws".to_string()
        });

        let connect_timeout_ms = match std::env::var("SFU_CONNECT_TIMEOUT_MS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| {
                anyhow::anyhow!("SFU_CONNECT_TIMEOUT_MS must be milliseconds: {}", e)
            })?,
            Err(_) => DEFAULT_SFU_CONNECT_TIMEOUT_MS,
        };

        let cors_origin = std::env::var("CORS_ORIGIN").ok().filter(|o| !o.is_empty());

        Ok(Config {
            bind_address,
            sfu: SfuConfig {
                url,
                connect_timeout: Duration::from_millis(connect_timeout_ms),
            },
            cors_origin,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub hub: Arc<Hub>,
    pub relay: Arc<Relay>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let hub = Arc::new(Hub::new());
        let relay = Arc::new(Relay::new(
            config.sfu.clone(),
            hub.clone(),
            Arc::new(ConnectionRegistry::new()),
            Arc::new(RoomRegistry::new()),
            Arc::new(PeerStreamIndex::new()),
        ));

        Self { config, hub, relay }
    }
}
