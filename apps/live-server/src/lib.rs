//! The WebSocket dispatcher and HTTP management surface for the live components
//! runtime: the thin multiplex that wires a single connection
//! across the State Signature Engine, Auth Gate, Connection Manager, Room
//! Manager and Component Registry crates.

pub mod alerts;
pub mod components;
pub mod config;
pub mod debug;
pub mod http;
pub mod rate_limit;
pub mod state;
pub mod ws;

pub use config::Config;
pub use state::AppState;

use axum::Router;
use tower_http::trace::TraceLayer;

/// Assembles the full router: the `/api/live/ws` upgrade plus the read-only (and
/// two write) management endpoints.
pub fn router(state: AppState) -> Router {
	Router::new()
		.merge(ws::routes())
		.merge(http::routes())
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

pub(crate) fn now_ms() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}
