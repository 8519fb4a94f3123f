//! Connection Manager: registration, sending, pools, heartbeat and
//! health. Built on the same pattern as `replicate-server::instance::InstanceManager`
//! (`DashMap`-keyed singleton, `debug!`-logged lifecycle) generalized from one
//! instance map into connections + named pools.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use live_common::{ConnectionId, UserId};
use tracing::{debug, info, instrument, warn};

use crate::connection::Connection;
use crate::error::ConnectionError;
use crate::health::{self, HealthStatus};
use crate::pool::{LoadBalanceStrategy, Pool};
use crate::queue::Priority;
use crate::transport::Transport;

pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

pub enum SendTarget<'a> {
	Connection(ConnectionId),
	Pool { name: &'a str, strategy: LoadBalanceStrategy },
	Broadcast,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
	pub priority: Priority,
	pub queue_if_offline: bool,
}

pub struct ConnectionManagerConfig {
	pub max_connections: usize,
	pub heartbeat_interval: Duration,
	pub health_check_interval: Duration,
}

impl Default for ConnectionManagerConfig {
	fn default() -> Self {
		Self {
			max_connections: DEFAULT_MAX_CONNECTIONS,
			heartbeat_interval: Duration::from_secs(30),
			health_check_interval: Duration::from_secs(15),
		}
	}
}

pub struct ConnectionManager {
	connections: DashMap<ConnectionId, Arc<Connection>>,
	pools: DashMap<String, Arc<Pool>>,
	config: ConnectionManagerConfig,
	count: AtomicU64,
}

impl ConnectionManager {
	pub fn new(config: ConnectionManagerConfig) -> Self {
		Self {
			connections: DashMap::new(),
			pools: DashMap::new(),
			config,
			count: AtomicU64::new(0),
		}
	}

	/// Registration: enforces the global maximum, initializes metrics
	/// and an empty offline queue.
	#[instrument(skip(self, transport))]
	pub fn register(
		&self,
		user_id: Option<UserId>,
		transport: Arc<dyn Transport>,
	) -> Result<Arc<Connection>, ConnectionError> {
		if self.connections.len() >= self.config.max_connections {
			return Err(ConnectionError::AtCapacity(self.config.max_connections));
		}
		let id = ConnectionId::random();
		let connection = Arc::new(Connection::new(id, user_id, transport));
		self.connections.insert(id, Arc::clone(&connection));
		self.count.fetch_add(1, Ordering::Relaxed);
		debug!(connection = %id, "registered connection");
		Ok(connection)
	}

	pub fn unregister(&self, id: ConnectionId) {
		if self.connections.remove(&id).is_some() {
			for pool in self.pools.iter() {
				pool.remove(id);
			}
			debug!(connection = %id, "unregistered connection");
		}
	}

	pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
		self.connections.get(&id).map(|entry| Arc::clone(&entry))
	}

	pub fn len(&self) -> usize {
		self.connections.len()
	}

	pub fn is_empty(&self) -> bool {
		self.connections.is_empty()
	}

	/// All currently registered connections, for the HTTP management surface's
	/// listing endpoints.
	pub fn all(&self) -> Vec<Arc<Connection>> {
		self.connections.iter().map(|entry| Arc::clone(&entry)).collect()
	}

	pub fn pool(&self, name: &str) -> Arc<Pool> {
		Arc::clone(
			self.pools
				.entry(name.to_string())
				.or_insert_with(|| Arc::new(Pool::new())),
		)
	}

	/// Looks up a pool without creating it, for the stats endpoint.
	pub fn pool_if_exists(&self, name: &str) -> Option<Arc<Pool>> {
		self.pools.get(name).map(|entry| Arc::clone(&entry))
	}

	pub fn add_to_pool(&self, pool_name: &str, connection_id: ConnectionId) {
		self.pool(pool_name).add(connection_id);
	}

	/// Sending: resolves `target` to one or more connections and sends
	/// to each, queuing for offline peers when requested.
	pub async fn send(
		&self,
		payload: Bytes,
		target: SendTarget<'_>,
		options: SendOptions,
	) -> Result<(), ConnectionError> {
		match target {
			SendTarget::Connection(id) => {
				let connection = self.get(id).ok_or(ConnectionError::NotFound(id))?;
				connection
					.send(payload, options.priority, options.queue_if_offline)
					.await
			}
			SendTarget::Pool { name, strategy } => {
				let pool = self
					.pools
					.get(name)
					.map(|p| Arc::clone(&p))
					.ok_or_else(|| ConnectionError::UnknownPool(name.to_string()))?;
				let connection = pool
					.select(strategy, |id| self.get(id))
					.ok_or(ConnectionError::NotWritable)?;
				connection
					.send(payload, options.priority, options.queue_if_offline)
					.await
			}
			SendTarget::Broadcast => {
				for entry in self.connections.iter() {
					let connection = Arc::clone(&entry);
					let _ = connection
						.send(payload.clone(), options.priority, options.queue_if_offline)
						.await;
				}
				Ok(())
			}
		}
	}

	/// Spawns the periodic heartbeat task. Pongs are expected to be reported back
	/// via [`Connection::metrics`]'s latency sample by the dispatcher's pong handler;
	/// this loop only emits pings and prunes dead sockets that fail to accept one.
	pub fn spawn_heartbeat(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
		let manager = Arc::clone(self);
		let interval = manager.config.heartbeat_interval;
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			loop {
				ticker.tick().await;
				let now_ms = crate::now_ms();
				for entry in manager.connections.iter() {
					let connection = Arc::clone(&entry);
					if connection.is_open() {
						match connection.transport.ping().await {
							Ok(()) => connection.mark_ping_sent(now_ms),
							Err(err) => warn!(connection = %connection.id, %err, "heartbeat ping failed"),
						}
					} else {
						connection.drain_offline_queue().await;
					}
				}
			}
		})
	}

	/// Spawns the periodic health-check task: unhealthy
	/// connections are actively closed and cleaned up.
	pub fn spawn_health_check(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
		let manager = Arc::clone(self);
		let interval = manager.config.health_check_interval;
		let heartbeat_interval = manager.config.heartbeat_interval;
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			loop {
				ticker.tick().await;
				let now_ms = crate::now_ms();
				let mut unhealthy = Vec::new();
				for entry in manager.connections.iter() {
					let connection = entry.value();
					let status = health::score(connection, now_ms, heartbeat_interval);
					connection.set_healthy(status != HealthStatus::Unhealthy);
					if status == HealthStatus::Unhealthy {
						unhealthy.push(connection.id);
					}
				}
				for id in unhealthy {
					if let Some(connection) = manager.get(id) {
						connection.transport.close().await;
					}
					manager.unregister(id);
					info!(connection = %id, "closed unhealthy connection");
				}
			}
		})
	}
}
