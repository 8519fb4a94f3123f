//! The router's shared state. Grounded
//! in `identity_server::oauth::RouterState`, generalized from one provider's
//! state to every subsystem this runtime composes.

use std::sync::Arc;

use live_auth::AuthGate;
use live_connections::ConnectionManager;
use live_registry::{ComponentRegistry, ConnectionDeliverer};
use live_rooms::RoomManager;
use live_signature::StateSignatureEngine;
use live_uploads::UploadManager;

use crate::alerts::AlertRegistry;
use crate::config::{Config, LiveLogging};
use crate::debug::DebugChannel;

#[derive(Clone)]
pub struct AppState {
	pub registry: Arc<ComponentRegistry>,
	pub auth_gate: Arc<AuthGate>,
	pub signature_engine: Arc<StateSignatureEngine>,
	pub connections: Arc<ConnectionManager>,
	pub rooms: Arc<RoomManager>,
	pub uploads: Arc<UploadManager>,
	pub deliverer: Arc<ConnectionDeliverer>,
	pub debug: Arc<DebugChannel>,
	pub alerts: Arc<AlertRegistry>,
	pub live_logging: Arc<LiveLogging>,
	pub started_at_ms: u64,
}

impl AppState {
	pub fn build(config: &Config) -> Self {
		let auth_gate = Arc::new(AuthGate::new());
		let signature_engine = Arc::new(StateSignatureEngine::new(
			config.signing_key(),
			config.signature_config(),
		));
		let connections = Arc::new(ConnectionManager::new(Default::default()));
		let rooms = Arc::new(RoomManager::new());
		let registry = Arc::new(ComponentRegistry::new(
			Arc::clone(&auth_gate),
			Arc::clone(&signature_engine),
			Arc::clone(&connections),
			Arc::clone(&rooms),
			Default::default(),
		));
		let deliverer = Arc::new(ConnectionDeliverer(Arc::clone(&connections)));
		let uploads = Arc::new(UploadManager::new(Default::default()));
		let debug = DebugChannel::new(config.debug_live);
		let alerts = AlertRegistry::new();
		let live_logging = Arc::new(config.live_logging());

		crate::components::register_all(&registry);

		Self {
			registry,
			auth_gate,
			signature_engine,
			connections,
			rooms,
			uploads,
			deliverer,
			debug,
			alerts,
			live_logging,
			started_at_ms: crate::now_ms(),
		}
	}

	/// Spawns every subsystem's background sweep. Held handles are intentionally dropped —
	/// these run for the lifetime of the process.
	pub fn spawn_background_tasks(&self) {
		self.connections.spawn_heartbeat();
		self.connections.spawn_health_check();
		self.rooms.spawn_cleanup_sweep();
		self.uploads.spawn_cleanup_sweep();
		self.registry.spawn_health_sweep();
		self.alerts.spawn_sweep(Arc::clone(&self.registry));
	}
}
