//! Health scoring.

use std::time::Duration;

use crate::connection::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
	Healthy,
	Degraded,
	Unhealthy,
}

const UNHEALTHY_LATENCY_MS: f64 = 5_000.0;
const UNHEALTHY_ERROR_RATE: f64 = 0.5;

/// `now_ms`/`heartbeat_interval` are passed in rather than read from a clock so the
/// scoring itself stays pure and unit-testable.
pub fn score(connection: &Connection, now_ms: u64, heartbeat_interval: Duration) -> HealthStatus {
	if !connection.is_open() {
		return HealthStatus::Unhealthy;
	}
	if connection.metrics.error_rate() > UNHEALTHY_ERROR_RATE {
		return HealthStatus::Unhealthy;
	}
	if connection.metrics.latency_ms() > UNHEALTHY_LATENCY_MS {
		return HealthStatus::Unhealthy;
	}

	let last_activity = connection
		.metrics
		.last_activity_ms
		.load(std::sync::atomic::Ordering::Relaxed);
	let idle_ms = now_ms.saturating_sub(last_activity);
	if idle_ms as u128 > 2 * heartbeat_interval.as_millis() {
		return HealthStatus::Degraded;
	}

	HealthStatus::Healthy
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::transport::Transport;
	use async_trait::async_trait;
	use bytes::Bytes;
	use live_common::ConnectionId;
	use std::sync::Arc;

	struct AlwaysOpen;

	#[async_trait]
	impl Transport for AlwaysOpen {
		fn is_open(&self) -> bool {
			true
		}
		async fn send(&self, _payload: Bytes) -> Result<(), String> {
			Ok(())
		}
		async fn ping(&self) -> Result<(), String> {
			Ok(())
		}
		async fn close(&self) {}
	}

	fn fresh_connection() -> Connection {
		Connection::new(ConnectionId::random(), None, Arc::new(AlwaysOpen))
	}

	#[test]
	fn idle_past_double_heartbeat_is_degraded() {
		let conn = fresh_connection();
		conn.metrics.touch(0);
		let status = score(&conn, 10_000, Duration::from_millis(1_000));
		assert_eq!(status, HealthStatus::Degraded);
	}

	#[test]
	fn recent_activity_is_healthy() {
		let conn = fresh_connection();
		conn.metrics.touch(9_500);
		let status = score(&conn, 10_000, Duration::from_millis(1_000));
		assert_eq!(status, HealthStatus::Healthy);
	}

	#[test]
	fn high_latency_is_unhealthy() {
		let conn = fresh_connection();
		conn.metrics.touch(10_000);
		conn.metrics.record_latency(6_000_000);
		let status = score(&conn, 10_000, Duration::from_millis(1_000));
		assert_eq!(status, HealthStatus::Unhealthy);
	}
}
