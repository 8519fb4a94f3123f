//! Performance alert tracking for `GET /api/live/performance/dashboard` and
//! `POST /api/live/performance/alerts/:id/resolve`. Kept local to this
//! app rather than in `live-registry` since it is purely an HTTP-surface
//! bookkeeping concern layered on top of [`live_registry::ComponentHealth`], not
//! a property of a mounted instance itself.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use live_common::ComponentId;
use live_registry::{ComponentHealth, ComponentRegistry};
use serde::Serialize;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
	pub component_id: ComponentId,
	pub class_name: String,
	pub raised_at_ms: u64,
	pub resolved: bool,
}

pub struct AlertRegistry {
	alerts: DashMap<ComponentId, Alert>,
}

impl AlertRegistry {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			alerts: DashMap::new(),
		})
	}

	pub fn all(&self) -> Vec<Alert> {
		self.alerts.iter().map(|e| e.clone()).collect()
	}

	/// Marks an alert resolved. Returns `false` if no alert is tracked for `id`.
	pub fn resolve(&self, id: ComponentId) -> bool {
		match self.alerts.get_mut(&id) {
			Some(mut alert) => {
				alert.resolved = true;
				true
			}
			None => false,
		}
	}

	/// Scans every mounted instance and raises (or leaves standing) an alert for
	/// each one that isn't healthy.
	fn sweep(&self, registry: &ComponentRegistry, now_ms: u64) {
		for instance in registry.all() {
			let health = instance.metadata.lock().health;
			if health == ComponentHealth::Healthy {
				continue;
			}
			self.alerts.entry(instance.id).or_insert_with(|| Alert {
				component_id: instance.id,
				class_name: instance.class_name.clone(),
				raised_at_ms: now_ms,
				resolved: false,
			});
		}
	}

	pub fn spawn_sweep(
		self: &Arc<Self>,
		registry: Arc<ComponentRegistry>,
	) -> tokio::task::JoinHandle<()> {
		let alerts = Arc::clone(self);
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
			loop {
				ticker.tick().await;
				alerts.sweep(&registry, crate::now_ms());
			}
		})
	}
}
