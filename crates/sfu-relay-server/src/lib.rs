//! SFU Signaling Relay Library
//!
//! This module exposes the relay components for testing and embedding.

pub mod api;
pub mod error;
pub mod registry;
pub mod relay;
pub mod sfu;
pub mod state;
pub mod transport;
pub mod ws;

/// Create and configure the relay application
pub fn create_app(config: state::Config) -> axum::Router {
    let app_state = state::AppState::new(config);
    api::create_router(app_state)
}
