use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use live_common::{ConnectionId, UserId};
use tracing::warn;

use crate::error::ConnectionError;
use crate::metrics::ConnectionMetrics;
use crate::queue::{OfflineQueue, Priority, DEFAULT_MAX_QUEUE_LEN, DEFAULT_MAX_RETRIES};
use crate::transport::Transport;

pub struct Connection {
	pub id: ConnectionId,
	pub user_id: Option<UserId>,
	pub transport: Arc<dyn Transport>,
	pub metrics: ConnectionMetrics,
	pub offline_queue: OfflineQueue,
	healthy: AtomicBool,
	/// Set by the heartbeat loop's successful ping, cleared by [`Self::record_pong`].
	ping_sent_at_ms: AtomicU64,
}

impl Connection {
	pub fn new(id: ConnectionId, user_id: Option<UserId>, transport: Arc<dyn Transport>) -> Self {
		Self {
			id,
			user_id,
			transport,
			metrics: ConnectionMetrics::default(),
			offline_queue: OfflineQueue::new(DEFAULT_MAX_QUEUE_LEN, DEFAULT_MAX_RETRIES),
			healthy: AtomicBool::new(true),
			ping_sent_at_ms: AtomicU64::new(0),
		}
	}

	pub fn mark_ping_sent(&self, now_ms: u64) {
		self.ping_sent_at_ms.store(now_ms, Ordering::Relaxed);
	}

	/// Folds the round-trip time since the last recorded ping into the latency
	/// moving average. A pong with no matching ping (already consumed, or the
	/// heartbeat never fired) is ignored rather than recording a bogus sample.
	pub fn record_pong(&self, now_ms: u64) {
		let sent_at = self.ping_sent_at_ms.swap(0, Ordering::Relaxed);
		if sent_at == 0 || now_ms < sent_at {
			return;
		}
		self.metrics.record_latency((now_ms - sent_at) * 1000);
	}

	pub fn is_open(&self) -> bool {
		self.transport.is_open()
	}

	pub fn is_healthy(&self) -> bool {
		self.healthy.load(Ordering::Relaxed)
	}

	pub fn set_healthy(&self, healthy: bool) {
		self.healthy.store(healthy, Ordering::Relaxed);
	}

	pub fn load_score(&self) -> u64 {
		self.metrics.messages_sent() + self.offline_queue.len() as u64
	}

	/// Sends `payload` now if the transport is open; otherwise, when `queue_if_offline`
	/// is set, enqueues it at `priority` for later delivery.
	pub async fn send(
		&self,
		payload: Bytes,
		priority: Priority,
		queue_if_offline: bool,
	) -> Result<(), ConnectionError> {
		if !self.is_open() {
			if queue_if_offline {
				return self.offline_queue.enqueue(payload, priority);
			}
			return Err(ConnectionError::NotWritable);
		}

		let len = payload.len();
		match self.transport.send(payload).await {
			Ok(()) => {
				self.metrics.record_sent(len);
				Ok(())
			}
			Err(err) => {
				self.metrics.record_error();
				Err(ConnectionError::Transport(err))
			}
		}
	}

	/// Drains the offline queue now that the transport is writable again, sending
	/// each entry in priority/FIFO order.
	pub async fn drain_offline_queue(self: &Arc<Self>) {
		if self.offline_queue.is_empty() || !self.is_open() {
			return;
		}

		let pending = self.offline_queue.drain_collect();
		let mut requeue = Vec::new();
		for mut entry in pending {
			match self.transport.send(entry.payload.clone()).await {
				Ok(()) => {
					self.metrics.record_sent(entry.payload.len());
				}
				Err(err) => {
					self.metrics.record_error();
					warn!(connection = %self.id, %err, "failed to drain offline queue entry");
					entry.retries += 1;
					if entry.retries <= DEFAULT_MAX_RETRIES {
						requeue.push(entry);
					}
				}
			}
		}
		self.offline_queue.requeue_front_many(requeue);
	}
}
