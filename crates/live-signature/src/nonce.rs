//! Single-use nonce tracking for anti-replay.
//!
//! A bounded, lock-guarded map of nonce -> expiry, swept lazily on access
//! rather than on a background timer.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::key::now_ms;

/// Hard cap on the nonce table, independent of the time-based expiry, so a flood of
/// distinct nonces can't grow the table without bound.
const MAX_TRACKED_NONCES: usize = 200_000;

pub struct NonceStore {
	consumed: Mutex<HashMap<String, u64>>,
	horizon: Duration,
}

impl NonceStore {
	pub fn new(horizon: Duration) -> Self {
		Self {
			consumed: Mutex::new(HashMap::new()),
			horizon,
		}
	}

	/// Attempts to consume `nonce`. Returns `true` if this is the first time it has
	/// been seen (within the horizon), `false` if it is a replay.
	pub fn consume(&self, nonce: &str) -> bool {
		let now = now_ms();
		let horizon_ms = self.horizon.as_millis() as u64;
		let mut consumed = self.consumed.lock();

		if consumed.len() >= MAX_TRACKED_NONCES {
			consumed.retain(|_, expires_at| *expires_at > now);
		}

		if let Some(expires_at) = consumed.get(nonce) {
			if *expires_at > now {
				return false;
			}
		}
		consumed.insert(nonce.to_string(), now + horizon_ms);
		true
	}

	/// Checks whether `nonce` has already been consumed, without consuming it.
	/// Used for read-only signature validation.
	pub fn has_consumed(&self, nonce: &str) -> bool {
		let now = now_ms();
		self.consumed
			.lock()
			.get(nonce)
			.is_some_and(|expires_at| *expires_at > now)
	}

	pub fn len(&self) -> usize {
		self.consumed.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn first_consume_succeeds_second_is_replay() {
		let store = NonceStore::new(Duration::from_secs(3600));
		assert!(store.consume("abc"));
		assert!(!store.consume("abc"));
	}

	#[test]
	fn has_consumed_does_not_mutate_state() {
		let store = NonceStore::new(Duration::from_secs(3600));
		assert!(!store.has_consumed("abc"));
		assert!(!store.has_consumed("abc"));
		assert!(store.consume("abc"));
		assert!(store.has_consumed("abc"));
	}
}
