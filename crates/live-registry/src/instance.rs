//! Component instance state and metadata.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use live_auth::AuthContext;
use live_common::{ComponentId, ConnectionId, RoomId, UserId};
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::component::LiveComponent;

/// Lifecycle states: `mounting -> active <-> inactive -> destroying ->
/// destroyed`, plus `error`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LifecycleState {
	Mounting,
	Active,
	Inactive,
	Destroying,
	Destroyed,
	Error,
}

/// Component Metadata `health enum`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ComponentHealth {
	Healthy,
	Degraded,
	Unhealthy,
}

#[derive(Debug, Clone)]
pub struct MigrationRecord {
	pub from_version: u32,
	pub to_version: u32,
	pub at_ms: u64,
	pub success: bool,
	pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct ComponentMetrics {
	pub render_count: u64,
	pub action_count: u64,
	pub error_count: u64,
	pub total_render_time_ms: u64,
	pub last_render_time_ms: u64,
	pub memory_estimate_bytes: u64,
}

impl ComponentMetrics {
	pub fn average_render_time_ms(&self) -> f64 {
		if self.render_count == 0 {
			0.0
		} else {
			self.total_render_time_ms as f64 / self.render_count as f64
		}
	}

	pub fn record_render(&mut self, duration_ms: u64, state_estimate_bytes: u64) {
		self.render_count += 1;
		self.total_render_time_ms += duration_ms;
		self.last_render_time_ms = duration_ms;
		self.memory_estimate_bytes = state_estimate_bytes;
	}
}

pub struct ComponentMetadata {
	pub mounted_at_ms: u64,
	pub last_activity_ms: u64,
	pub lifecycle: LifecycleState,
	pub health: ComponentHealth,
	pub declared_dependencies: Vec<&'static str>,
	pub injected_services: HashSet<String>,
	pub metrics: ComponentMetrics,
	pub migration_history: Vec<MigrationRecord>,
	/// Consecutive health sweeps that found this instance unhealthy. Reset to
	/// 0 by the first sweep that finds it degraded or healthy again.
	pub recovery_attempts: u32,
}

impl ComponentMetadata {
	pub fn new(now_ms: u64, declared_dependencies: Vec<&'static str>) -> Self {
		Self {
			mounted_at_ms: now_ms,
			last_activity_ms: now_ms,
			lifecycle: LifecycleState::Mounting,
			health: ComponentHealth::Healthy,
			declared_dependencies,
			injected_services: HashSet::new(),
			metrics: ComponentMetrics::default(),
			migration_history: Vec::new(),
			recovery_attempts: 0,
		}
	}
}

/// A live, mounted component instance.
///
/// The boxed component lives behind a `tokio::sync::Mutex`, which doubles as the
/// per-instance action serialization lock: at most one action executes on a
/// given component at any time, since acquiring it to run `mount`,
/// `execute_action`, or a migration already excludes every other caller.
pub struct ComponentInstance {
	pub id: ComponentId,
	pub class_name: String,
	pub debug_label: Option<String>,
	pub owning_connection: ConnectionId,
	pub user_id: Option<UserId>,
	pub room: Mutex<Option<(String, RoomId)>>,
	pub auth_context: AuthContext,
	pub version: AtomicU32,
	pub metadata: Mutex<ComponentMetadata>,
	pub component: AsyncMutex<Box<dyn LiveComponent>>,
}

impl ComponentInstance {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		id: ComponentId,
		class_name: String,
		owning_connection: ConnectionId,
		user_id: Option<UserId>,
		auth_context: AuthContext,
		component: Box<dyn LiveComponent>,
		declared_dependencies: Vec<&'static str>,
		version: u32,
		now_ms: u64,
	) -> Arc<Self> {
		Arc::new(Self {
			id,
			class_name,
			debug_label: None,
			owning_connection,
			user_id,
			room: Mutex::new(None),
			auth_context,
			version: AtomicU32::new(version),
			metadata: Mutex::new(ComponentMetadata::new(now_ms, declared_dependencies)),
			component: AsyncMutex::new(component),
		})
	}

	pub fn touch(&self, now_ms: u64) {
		self.metadata.lock().last_activity_ms = now_ms;
	}

	pub fn mark_active(&self) {
		self.metadata.lock().lifecycle = LifecycleState::Active;
	}

	pub fn current_version(&self) -> u32 {
		self.version.load(Ordering::SeqCst)
	}

	pub fn next_version(&self) -> u32 {
		self.version.fetch_add(1, Ordering::SeqCst) + 1
	}
}
