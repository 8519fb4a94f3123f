//! The Component Registry: end-to-end authority over component
//! instances — mount, rehydrate, action dispatch, property updates, migration,
//! health monitoring and cleanup. The composition root the rest of the runtime is
//! built on.

use std::any::Any;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use live_auth::{mount_rule_of, AuthContext, AuthGate, ComponentAuthRules};
use live_common::{ComponentId, ConnectionId, RoomId, UserId};
use live_connections::ConnectionManager;
use live_rooms::RoomManager;
use live_signature::{SignOptions, SignatureError, StateSignatureEngine, ValidationOutcome};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::component::{name_variants, ComponentFactory, LiveComponent, NullObserver, ServiceFactory};
use crate::delivery::ConnectionDeliverer;
use crate::error::RegistryError;
use crate::instance::{ComponentHealth, ComponentInstance, LifecycleState, MigrationRecord};
use crate::observer::{RoomObserver, ROOM_KIND};

#[derive(Debug, Clone)]
pub struct RegistryConfig {
	pub health_check_interval: Duration,
	pub idle_degraded_after: Duration,
	pub error_count_unhealthy_threshold: u64,
	pub memory_degraded_bytes: u64,
	/// Consecutive unhealthy-recovery attempts allowed before giving up and
	/// transitioning the instance to `LifecycleState::Error` instead.
	pub max_recovery_attempts: u32,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			health_check_interval: Duration::from_secs(30),
			idle_degraded_after: Duration::from_secs(5 * 60),
			error_count_unhealthy_threshold: 10,
			memory_degraded_bytes: 16 * 1024 * 1024,
			max_recovery_attempts: 3,
		}
	}
}

pub struct MountOutcome {
	pub component_id: ComponentId,
	pub class_name: String,
	pub state: Value,
	pub signed_state: live_common::SignedStateEnvelope,
}

pub struct RehydrateOutcome {
	pub new_component_id: ComponentId,
	pub class_name: String,
	pub state: Value,
	pub signed_state: live_common::SignedStateEnvelope,
}

pub struct ActionOutcome {
	pub result: Value,
	pub state: Value,
	pub signed_state: live_common::SignedStateEnvelope,
}

pub struct ComponentRegistry {
	definitions: DashMap<String, ComponentFactory>,
	auth_rules: DashMap<String, ComponentAuthRules>,
	services: DashMap<String, ServiceFactory>,
	instances: DashMap<ComponentId, Arc<ComponentInstance>>,
	auth_gate: Arc<AuthGate>,
	signature_engine: Arc<StateSignatureEngine>,
	connections: Arc<ConnectionManager>,
	rooms: Arc<RoomManager>,
	deliverer: Arc<ConnectionDeliverer>,
	config: RegistryConfig,
	mounted_count: AtomicU64,
}

impl ComponentRegistry {
	pub fn new(
		auth_gate: Arc<AuthGate>,
		signature_engine: Arc<StateSignatureEngine>,
		connections: Arc<ConnectionManager>,
		rooms: Arc<RoomManager>,
		config: RegistryConfig,
	) -> Self {
		let deliverer = Arc::new(ConnectionDeliverer(Arc::clone(&connections)));
		Self {
			definitions: DashMap::new(),
			auth_rules: DashMap::new(),
			services: DashMap::new(),
			instances: DashMap::new(),
			auth_gate,
			signature_engine,
			connections,
			rooms,
			deliverer,
			config,
			mounted_count: AtomicU64::new(0),
		}
	}

	/// Registers a component class under `name`. There is no directory scan or
	/// prototype-chain sniffing at runtime; this explicit call is the only way a
	/// class becomes mountable.
	pub fn register(
		&self,
		name: impl Into<String>,
		factory: impl Fn() -> Box<dyn LiveComponent> + Send + Sync + 'static,
	) {
		self.definitions.insert(name.into(), Arc::new(factory));
	}

	pub fn register_auth_rules(&self, name: impl Into<String>, rules: ComponentAuthRules) {
		self.auth_rules.insert(name.into(), rules);
	}

	/// Service container: a name-to-factory map; factories are invoked
	/// on every resolution, matching `resolve`'s per-call semantics.
	pub fn register_service(
		&self,
		name: impl Into<String>,
		factory: impl Fn() -> Arc<dyn Any + Send + Sync> + Send + Sync + 'static,
	) {
		self.services.insert(name.into(), Arc::new(factory));
	}

	fn resolve_factory(&self, requested: &str) -> Option<(String, ComponentFactory)> {
		for variant in name_variants(requested) {
			if let Some(factory) = self.definitions.get(&variant) {
				return Some((variant, Arc::clone(&factory)));
			}
		}
		None
	}

	fn mount_rule_for(&self, class_name: &str) -> live_auth::MountRule {
		mount_rule_of(self.auth_rules.get(class_name).as_deref())
	}

	fn inject_dependencies(
		&self,
		component: &mut dyn LiveComponent,
	) -> Result<HashSet<String>, RegistryError> {
		let required: Vec<&'static str> = component.required_dependencies().to_vec();
		let optional: Vec<&'static str> = component.optional_dependencies().to_vec();

		for name in &required {
			if !self.services.contains_key(*name) {
				return Err(RegistryError::MissingDependency((*name).to_string()));
			}
		}

		let mut injected = HashSet::new();
		for name in required.iter().chain(optional.iter()) {
			if let Some(factory) = self.services.get(*name) {
				component.inject_service(name, factory());
				injected.insert((*name).to_string());
			}
		}
		Ok(injected)
	}

	/// Mount: validate dependencies, resolve the class, authorize,
	/// construct, inject, join a room if requested, sign the initial state.
	#[instrument(skip(self, props, auth_context))]
	#[allow(clippy::too_many_arguments)]
	pub async fn mount(
		&self,
		requested_name: &str,
		props: serde_json::Map<String, Value>,
		connection_id: ConnectionId,
		user_id: Option<UserId>,
		auth_context: AuthContext,
		room_id: Option<RoomId>,
		now_ms: u64,
	) -> Result<MountOutcome, RegistryError> {
		let (class_name, factory) = self
			.resolve_factory(requested_name)
			.ok_or_else(|| RegistryError::ComponentNotFound(requested_name.to_string()))?;

		let rule = self.mount_rule_for(&class_name);
		let decision = self.auth_gate.authorize_mount(&auth_context, &rule);
		if !decision.allowed {
			return Err(RegistryError::AuthDenied(decision.reason));
		}

		let mut component = factory();
		let declared_dependencies: Vec<&'static str> = component
			.required_dependencies()
			.iter()
			.chain(component.optional_dependencies().iter())
			.copied()
			.collect();
		let injected = self.inject_dependencies(component.as_mut())?;
		component.set_auth_context(auth_context.clone());

		let id = ComponentId::random();
		if let Some(room_id) = &room_id {
			component.set_observer(Arc::new(RoomObserver {
				rooms: Arc::clone(&self.rooms),
				deliverer: Arc::clone(&self.deliverer),
				room_id: room_id.clone(),
				component_id: id,
				connection_id,
			}));
		} else {
			component.set_observer(Arc::new(NullObserver));
		}

		let state = component.mount(Value::Object(props));

		let instance = ComponentInstance::new(
			id,
			class_name.clone(),
			connection_id,
			user_id,
			auth_context,
			component,
			declared_dependencies,
			1,
			now_ms,
		);
		instance.metadata.lock().injected_services = injected;
		instance.mark_active();

		if let Some(room_id) = &room_id {
			self.rooms
				.join(ROOM_KIND, room_id, id, connection_id, now_ms)
				.await;
			*instance.room.lock() = Some((ROOM_KIND.to_string(), room_id.clone()));
		}

		self.instances.insert(id, instance);
		self.mounted_count.fetch_add(1, Ordering::Relaxed);

		let signed_state = self.signature_engine.sign(
			id,
			&class_name,
			state.clone(),
			1,
			SignOptions::default(),
		)?;
		debug!(component = %id, class = %class_name, "mounted component");

		Ok(MountOutcome {
			component_id: id,
			class_name,
			state,
			signed_state,
		})
	}

	/// Rehydrate: validate signature (consuming the nonce), resolve the
	/// class, authorize, extract, reject cross-class tampering, construct and
	/// register under a fresh id.
	#[instrument(skip(self, signed_state, auth_context))]
	#[allow(clippy::too_many_arguments)]
	pub async fn rehydrate(
		&self,
		requested_name: &str,
		signed_state: &live_common::SignedStateEnvelope,
		connection_id: ConnectionId,
		user_id: Option<UserId>,
		auth_context: AuthContext,
		room_id: Option<RoomId>,
		now_ms: u64,
	) -> Result<RehydrateOutcome, RegistryError> {
		match self.signature_engine.validate(signed_state, false) {
			ValidationOutcome::Valid | ValidationOutcome::KeyRotated => {}
			ValidationOutcome::Expired => return Err(RegistryError::Expired),
			ValidationOutcome::Tampered => return Err(RegistryError::InvalidSignature),
			ValidationOutcome::Replayed => return Err(RegistryError::Replayed),
			ValidationOutcome::KeyNotFound => return Err(RegistryError::KeyNotFound),
		}

		let (class_name, factory) = self
			.resolve_factory(requested_name)
			.ok_or_else(|| RegistryError::ComponentNotFound(requested_name.to_string()))?;

		let rule = self.mount_rule_for(&class_name);
		let decision = self.auth_gate.authorize_mount(&auth_context, &rule);
		if !decision.allowed {
			return Err(RegistryError::AuthDenied(decision.reason));
		}

		let (embedded_name, state) = self.signature_engine.extract(signed_state)?;
		if embedded_name != class_name {
			warn!(
				embedded = %embedded_name,
				requested = %class_name,
				"rejected rehydration: cross-class tampering"
			);
			return Err(RegistryError::ClassMismatch);
		}

		let mut component = factory();
		let declared_dependencies: Vec<&'static str> = component
			.required_dependencies()
			.iter()
			.chain(component.optional_dependencies().iter())
			.copied()
			.collect();
		let injected = self.inject_dependencies(component.as_mut())?;
		component.set_auth_context(auth_context.clone());

		let id = ComponentId::random();
		if let Some(room_id) = &room_id {
			component.set_observer(Arc::new(RoomObserver {
				rooms: Arc::clone(&self.rooms),
				deliverer: Arc::clone(&self.deliverer),
				room_id: room_id.clone(),
				component_id: id,
				connection_id,
			}));
		} else {
			component.set_observer(Arc::new(NullObserver));
		}
		component.set_state(state.clone());

		let new_version = signed_state.version + 1;
		let instance = ComponentInstance::new(
			id,
			class_name.clone(),
			connection_id,
			user_id,
			auth_context,
			component,
			declared_dependencies,
			new_version,
			now_ms,
		);
		instance.metadata.lock().injected_services = injected;
		instance.mark_active();

		if let Some(room_id) = &room_id {
			self.rooms
				.join(ROOM_KIND, room_id, id, connection_id, now_ms)
				.await;
			*instance.room.lock() = Some((ROOM_KIND.to_string(), room_id.clone()));
		}

		self.instances.insert(id, instance);

		let freshly_signed =
			self.signature_engine
				.sign(id, &class_name, state.clone(), new_version, SignOptions::default())?;
		info!(old = %requested_name, new = %id, "rehydrated component");

		Ok(RehydrateOutcome {
			new_component_id: id,
			class_name,
			state,
			signed_state: freshly_signed,
		})
	}

	/// Action dispatch. A missing instance surfaces the distinct
	/// `COMPONENT_REHYDRATION_REQUIRED` sentinel rather than a generic not-found.
	#[instrument(skip(self, payload))]
	pub async fn call_action(
		&self,
		component_id: ComponentId,
		action: &str,
		payload: Value,
		now_ms: u64,
	) -> Result<ActionOutcome, RegistryError> {
		let instance = self
			.instances
			.get(&component_id)
			.map(|e| Arc::clone(&e))
			.ok_or(RegistryError::RehydrationRequired(component_id))?;

		let action_rule = self
			.auth_rules
			.get(&instance.class_name)
			.and_then(|r| r.actions.get(action).cloned());
		let decision = self
			.auth_gate
			.authorize_action(
				&instance.auth_context,
				&instance.class_name,
				action,
				action_rule.as_ref(),
				instance.auth_context.provider_name(),
			)
			.await;
		if !decision.allowed {
			return Err(RegistryError::AuthDenied(decision.reason));
		}

		let started = std::time::Instant::now();
		let result = {
			let mut component = instance.component.lock().await;
			component.execute_action(action, payload)
		};
		let render_time_ms = started.elapsed().as_millis() as u64;

		let result = match result {
			Ok(value) => {
				let mut metadata = instance.metadata.lock();
				metadata.metrics.action_count += 1;
				value
			}
			Err(reason) => {
				let mut metadata = instance.metadata.lock();
				metadata.metrics.action_count += 1;
				metadata.metrics.error_count += 1;
				return Err(RegistryError::ActionFailed(reason));
			}
		};

		instance.touch(now_ms);
		let state = instance.component.lock().await.state();
		let state_bytes = serde_json::to_vec(&state).map(|v| v.len() as u64).unwrap_or(0);
		instance
			.metadata
			.lock()
			.metrics
			.record_render(render_time_ms, state_bytes);
		let version = instance.next_version();
		let signed_state = self.signature_engine.sign(
			component_id,
			&instance.class_name,
			state.clone(),
			version,
			SignOptions::default(),
		)?;

		Ok(ActionOutcome {
			result,
			state,
			signed_state,
		})
	}

	/// Property update: shallow-set one state key, then re-sign.
	pub async fn set_property(
		&self,
		component_id: ComponentId,
		property: &str,
		value: Value,
		now_ms: u64,
	) -> Result<ActionOutcome, RegistryError> {
		let instance = self
			.instances
			.get(&component_id)
			.map(|e| Arc::clone(&e))
			.ok_or(RegistryError::RehydrationRequired(component_id))?;

		let state = {
			let mut component = instance.component.lock().await;
			let mut state = component.state();
			let Some(map) = state.as_object_mut() else {
				return Err(RegistryError::UnknownProperty(property.to_string()));
			};
			map.insert(property.to_string(), value);
			component.set_state(state.clone());
			state
		};

		instance.touch(now_ms);
		let version = instance.next_version();
		let signed_state = self.signature_engine.sign(
			component_id,
			&instance.class_name,
			state.clone(),
			version,
			SignOptions::default(),
		)?;

		Ok(ActionOutcome {
			result: Value::Null,
			state,
			signed_state,
		})
	}

	/// State migration: rewrite live state in place via a migration
	/// function already registered on the signature engine, recording the outcome.
	pub async fn migrate(
		&self,
		component_id: ComponentId,
		from_version: u32,
		to_version: u32,
		now_ms: u64,
	) -> Result<(), RegistryError> {
		let instance = self
			.instances
			.get(&component_id)
			.map(|e| Arc::clone(&e))
			.ok_or(RegistryError::RehydrationRequired(component_id))?;

		let current_state = instance.component.lock().await.state();
		let migration_result = self
			.signature_engine
			.migrate(from_version, to_version, current_state);

		let mut metadata = instance.metadata.lock();
		match migration_result {
			Ok(new_state) => {
				drop(metadata);
				instance.component.lock().await.set_state(new_state);
				instance
					.version
					.store(to_version, Ordering::SeqCst);
				instance.metadata.lock().migration_history.push(MigrationRecord {
					from_version,
					to_version,
					at_ms: now_ms,
					success: true,
					error: None,
				});
				Ok(())
			}
			Err(err) => {
				metadata.migration_history.push(MigrationRecord {
					from_version,
					to_version,
					at_ms: now_ms,
					success: false,
					error: Some(err.to_string()),
				});
				Err(RegistryError::Signature(err))
			}
		}
	}

	/// Cleanup: tear down room subscriptions, call `destroy`, drop
	/// metadata, remove from the owning connection's instance set (the caller, which
	/// holds the connection's instance list, is responsible for that last step).
	pub async fn unmount(&self, component_id: ComponentId) -> Result<(), RegistryError> {
		let Some((_, instance)) = self.instances.remove(&component_id) else {
			return Err(RegistryError::InstanceNotFound(component_id));
		};
		self.rooms.cleanup_component(component_id).await;
		instance.metadata.lock().lifecycle = LifecycleState::Destroying;
		instance.component.lock().await.destroy();
		instance.metadata.lock().lifecycle = LifecycleState::Destroyed;
		debug!(component = %component_id, "unmounted component");
		Ok(())
	}

	/// Removes every instance owned by `connection_id`, e.g. when a connection
	/// drops without rehydration being requested by the client.
	pub async fn unmount_connection(&self, connection_id: ConnectionId) {
		let owned: Vec<ComponentId> = self
			.instances
			.iter()
			.filter(|e| e.owning_connection == connection_id)
			.map(|e| *e.key())
			.collect();
		for id in owned {
			let _ = self.unmount(id).await;
		}
	}

	pub fn get(&self, component_id: ComponentId) -> Option<Arc<ComponentInstance>> {
		self.instances.get(&component_id).map(|e| Arc::clone(&e))
	}

	/// Every currently mounted instance, for the performance dashboard.
	pub fn all(&self) -> Vec<Arc<ComponentInstance>> {
		self.instances.iter().map(|e| Arc::clone(&e)).collect()
	}

	pub fn instance_count(&self) -> usize {
		self.instances.len()
	}

	pub fn mounted_count(&self) -> u64 {
		self.mounted_count.load(Ordering::Relaxed)
	}

	/// Health monitoring: runs every `health_check_interval`, degrading
	/// idle or memory-heavy instances and attempting recovery on instances that
	/// cross the error-count threshold.
	pub fn spawn_health_sweep(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
		let registry = Arc::clone(self);
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(registry.config.health_check_interval);
			loop {
				ticker.tick().await;
				registry.run_health_sweep().await;
			}
		})
	}

	async fn run_health_sweep(&self) {
		let now_ms = crate::now_ms();
		let ids: Vec<ComponentId> = self.instances.iter().map(|e| *e.key()).collect();
		for id in ids {
			let Some(instance) = self.instances.get(&id).map(|e| Arc::clone(&e)) else {
				continue;
			};
			let (idle_ms, error_count, memory_bytes) = {
				let metadata = instance.metadata.lock();
				(
					now_ms.saturating_sub(metadata.last_activity_ms),
					metadata.metrics.error_count,
					metadata.metrics.memory_estimate_bytes,
				)
			};

			let mut became_unhealthy = false;
			{
				let mut metadata = instance.metadata.lock();
				if error_count > self.config.error_count_unhealthy_threshold {
					metadata.health = ComponentHealth::Unhealthy;
					became_unhealthy = true;
				} else if idle_ms > self.config.idle_degraded_after.as_millis() as u64
					|| memory_bytes > self.config.memory_degraded_bytes
				{
					metadata.health = ComponentHealth::Degraded;
					metadata.recovery_attempts = 0;
				} else {
					metadata.health = ComponentHealth::Healthy;
					metadata.recovery_attempts = 0;
				}
			}

			if became_unhealthy {
				// Only reset by a sweep that finds the instance no longer unhealthy, so
				// this counts consecutive unhealthy sweeps rather than resetting itself
				// on every single recovery.
				let recovered = {
					let mut metadata = instance.metadata.lock();
					metadata.recovery_attempts += 1;
					if metadata.recovery_attempts <= self.config.max_recovery_attempts {
						metadata.metrics.error_count = 0;
						metadata.health = ComponentHealth::Healthy;
						true
					} else {
						metadata.lifecycle = LifecycleState::Error;
						false
					}
				};

				let message = if recovered {
					live_common::ServerMessage::ComponentRecovered { component_id: id }
				} else {
					live_common::ServerMessage::Error {
						error: format!("COMPONENT_RECOVERY_FAILED:{id}"),
						request_id: None,
					}
				};
				match serde_json::to_vec(&message) {
					Ok(encoded) => {
						let _ = self
							.connections
							.send(
								bytes::Bytes::from(encoded),
								live_connections::SendTarget::Connection(instance.owning_connection),
								live_connections::SendOptions {
									queue_if_offline: true,
									..Default::default()
								},
							)
							.await;
						if recovered {
							info!(component = %id, "recovered unhealthy component");
						} else {
							warn!(component = %id, "recovery failed, component transitioned to error");
						}
					}
					Err(err) => warn!(%err, "failed to serialize health sweep outcome message"),
				}
			}
		}
	}
}

pub(crate) fn now_ms() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}

#[cfg(test)]
mod test {
	use std::sync::Arc;

	use live_auth::{AuthContext, AuthGate};
	use live_common::ConnectionId;
	use live_connections::{ConnectionManager, ConnectionManagerConfig};
	use live_rooms::RoomManager;
	use live_signature::{SignatureConfig, SigningKey, StateSignatureEngine};

	use super::*;
	use crate::test_support::CounterComponent;

	fn registry(config: RegistryConfig) -> Arc<ComponentRegistry> {
		let auth_gate = Arc::new(AuthGate::new());
		let signature_engine = Arc::new(StateSignatureEngine::new(
			SigningKey::generate(),
			SignatureConfig::default(),
		));
		let connections = Arc::new(ConnectionManager::new(ConnectionManagerConfig::default()));
		let rooms = Arc::new(RoomManager::new());
		let registry = Arc::new(ComponentRegistry::new(auth_gate, signature_engine, connections, rooms, config));
		registry.register("Counter", || Box::new(CounterComponent::default()));
		registry
	}

	#[tokio::test]
	async fn unhealthy_component_recovers_within_the_attempt_ceiling() {
		let registry = registry(RegistryConfig {
			error_count_unhealthy_threshold: 0,
			max_recovery_attempts: 2,
			..Default::default()
		});
		let mount = registry
			.mount(
				"Counter",
				serde_json::json!({}).as_object().unwrap().clone(),
				ConnectionId::random(),
				None,
				AuthContext::Anonymous,
				None,
				0,
			)
			.await
			.unwrap();
		let instance = Arc::clone(&registry.instances.get(&mount.component_id).unwrap());
		instance.metadata.lock().metrics.error_count = 1;

		registry.run_health_sweep().await;

		let metadata = instance.metadata.lock();
		assert_eq!(metadata.health, ComponentHealth::Healthy);
		assert_eq!(metadata.lifecycle, LifecycleState::Active);
		assert_eq!(metadata.recovery_attempts, 1);
	}

	#[tokio::test]
	async fn unhealthy_component_errors_out_past_the_attempt_ceiling() {
		let registry = registry(RegistryConfig {
			error_count_unhealthy_threshold: 0,
			max_recovery_attempts: 1,
			..Default::default()
		});
		let mount = registry
			.mount(
				"Counter",
				serde_json::json!({}).as_object().unwrap().clone(),
				ConnectionId::random(),
				None,
				AuthContext::Anonymous,
				None,
				0,
			)
			.await
			.unwrap();
		let instance = Arc::clone(&registry.instances.get(&mount.component_id).unwrap());

		instance.metadata.lock().metrics.error_count = 1;
		registry.run_health_sweep().await;
		assert_eq!(instance.metadata.lock().lifecycle, LifecycleState::Active);

		instance.metadata.lock().metrics.error_count = 1;
		registry.run_health_sweep().await;

		let metadata = instance.metadata.lock();
		assert_eq!(metadata.lifecycle, LifecycleState::Error);
		assert_eq!(metadata.recovery_attempts, 2);
	}
}
