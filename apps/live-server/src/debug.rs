//! The `DEBUG_LIVE`-gated debug channel: a bounded
//! ring buffer of recent dispatcher events plus a live broadcast feed for
//! `GET /api/live/debug/ws` subscribers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

const RING_CAPACITY: usize = 500;
const BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
pub struct DebugEvent {
	pub at_ms: u64,
	pub category: String,
	pub message: String,
}

pub struct DebugChannel {
	enabled: AtomicBool,
	ring: Mutex<std::collections::VecDeque<DebugEvent>>,
	feed: broadcast::Sender<DebugEvent>,
}

impl DebugChannel {
	pub fn new(enabled: bool) -> Arc<Self> {
		let (feed, _rx) = broadcast::channel(BROADCAST_CAPACITY);
		Arc::new(Self {
			enabled: AtomicBool::new(enabled),
			ring: Mutex::new(std::collections::VecDeque::with_capacity(RING_CAPACITY)),
			feed,
		})
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled.load(Ordering::Relaxed)
	}

	pub fn set_enabled(&self, enabled: bool) {
		self.enabled.store(enabled, Ordering::Relaxed);
	}

	pub fn subscribe(&self) -> broadcast::Receiver<DebugEvent> {
		self.feed.subscribe()
	}

	/// Records `event` into the ring buffer and the live feed, a no-op while
	/// disabled so normal dispatch pays nothing for it.
	pub fn record(&self, category: &str, message: impl Into<String>) {
		if !self.is_enabled() {
			return;
		}
		let event = DebugEvent {
			at_ms: crate::now_ms(),
			category: category.to_string(),
			message: message.into(),
		};
		let mut ring = self.ring.lock();
		if ring.len() >= RING_CAPACITY {
			ring.pop_front();
		}
		ring.push_back(event.clone());
		drop(ring);
		let _ = self.feed.send(event);
	}

	pub fn snapshot(&self) -> Vec<DebugEvent> {
		self.ring.lock().iter().cloned().collect()
	}

	pub fn clear(&self) {
		self.ring.lock().clear();
	}
}
