//! Per-connection metrics. Atomic increments only, never a hot-path lock.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ConnectionMetrics {
	pub messages_sent: AtomicU64,
	pub messages_received: AtomicU64,
	pub bytes_sent: AtomicU64,
	pub bytes_received: AtomicU64,
	pub send_errors: AtomicU64,
	pub last_activity_ms: AtomicU64,
	/// Moving-average round-trip latency in milliseconds, scaled by 1000 for
	/// integer storage (so e.g. 12.5ms is stored as 12500).
	pub latency_avg_micros: AtomicU64,
}

impl ConnectionMetrics {
	pub fn record_sent(&self, bytes: usize) {
		self.messages_sent.fetch_add(1, Ordering::Relaxed);
		self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
	}

	pub fn record_received(&self, bytes: usize) {
		self.messages_received.fetch_add(1, Ordering::Relaxed);
		self.bytes_received
			.fetch_add(bytes as u64, Ordering::Relaxed);
	}

	pub fn record_error(&self) {
		self.send_errors.fetch_add(1, Ordering::Relaxed);
	}

	pub fn touch(&self, now_ms: u64) {
		self.last_activity_ms.store(now_ms, Ordering::Relaxed);
	}

	/// Folds a new round-trip sample into the moving average with a fixed decay,
	/// matching the classic exponential moving average used for TCP RTT estimates.
	pub fn record_latency(&self, sample_micros: u64) {
		let prev = self.latency_avg_micros.load(Ordering::Relaxed);
		let next = if prev == 0 {
			sample_micros
		} else {
			(prev * 7 + sample_micros * 3) / 10
		};
		self.latency_avg_micros.store(next, Ordering::Relaxed);
	}

	pub fn messages_sent(&self) -> u64 {
		self.messages_sent.load(Ordering::Relaxed)
	}

	pub fn error_rate(&self) -> f64 {
		let sent = self.messages_sent.load(Ordering::Relaxed) as f64;
		let errors = self.send_errors.load(Ordering::Relaxed) as f64;
		if sent + errors == 0.0 {
			0.0
		} else {
			errors / (sent + errors)
		}
	}

	pub fn latency_ms(&self) -> f64 {
		self.latency_avg_micros.load(Ordering::Relaxed) as f64 / 1000.0
	}
}
