//! Connection registration, per-connection metrics, pools, load balancing,
//! heartbeat/health and offline message queuing.

mod connection;
mod error;
mod health;
mod manager;
mod metrics;
mod pool;
mod queue;
mod transport;

pub use connection::Connection;
pub use error::ConnectionError;
pub use health::HealthStatus;
pub use manager::{
	ConnectionManager, ConnectionManagerConfig, SendOptions, SendTarget, DEFAULT_MAX_CONNECTIONS,
};
pub use metrics::ConnectionMetrics;
pub use pool::{LoadBalanceStrategy, Pool};
pub use queue::{OfflineQueue, Priority, QueuedMessage, DEFAULT_MAX_QUEUE_LEN, DEFAULT_MAX_RETRIES};
pub use transport::Transport;

pub(crate) fn now_ms() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}
