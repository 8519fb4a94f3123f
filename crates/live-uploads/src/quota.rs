//! Per-user rolling 24h upload quota. Implemented as a fixed window keyed by the
//! first accepted upload's timestamp, a simple counter rather than a sliding log
//! since the only requirement is a reset every 24h.

use std::collections::HashMap;

use live_common::UserId;
use parking_lot::Mutex;

use crate::validation::{MAX_USER_QUOTA_PER_WINDOW, QUOTA_WINDOW_SECS};

struct WindowUsage {
	window_start_secs: u64,
	bytes_used: u64,
}

#[derive(Default)]
pub struct QuotaTracker {
	usage: Mutex<HashMap<UserId, WindowUsage>>,
}

impl QuotaTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns `true` and reserves `declared_size` if the user has quota remaining
	/// in the current window, rolling the window over if it has expired.
	pub fn try_reserve(&self, user_id: UserId, declared_size: u64, now_secs: u64) -> bool {
		let mut usage = self.usage.lock();
		let entry = usage.entry(user_id).or_insert(WindowUsage {
			window_start_secs: now_secs,
			bytes_used: 0,
		});
		if now_secs.saturating_sub(entry.window_start_secs) >= QUOTA_WINDOW_SECS {
			entry.window_start_secs = now_secs;
			entry.bytes_used = 0;
		}
		if entry.bytes_used.saturating_add(declared_size) > MAX_USER_QUOTA_PER_WINDOW {
			return false;
		}
		entry.bytes_used += declared_size;
		true
	}

	/// Releases a reservation, e.g. when an upload is rejected after the quota
	/// check but before `complete`.
	pub fn release(&self, user_id: UserId, declared_size: u64) {
		let mut usage = self.usage.lock();
		if let Some(entry) = usage.get_mut(&user_id) {
			entry.bytes_used = entry.bytes_used.saturating_sub(declared_size);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn rejects_once_quota_exhausted() {
		let tracker = QuotaTracker::new();
		let user = UserId::random();
		assert!(tracker.try_reserve(user, 400 * 1024 * 1024, 0));
		assert!(!tracker.try_reserve(user, 150 * 1024 * 1024, 0));
	}

	#[test]
	fn resets_after_window_elapses() {
		let tracker = QuotaTracker::new();
		let user = UserId::random();
		assert!(tracker.try_reserve(user, 400 * 1024 * 1024, 0));
		assert!(tracker.try_reserve(user, 400 * 1024 * 1024, QUOTA_WINDOW_SECS + 1));
	}

	#[test]
	fn release_frees_reserved_bytes() {
		let tracker = QuotaTracker::new();
		let user = UserId::random();
		assert!(tracker.try_reserve(user, 400 * 1024 * 1024, 0));
		tracker.release(user, 400 * 1024 * 1024);
		assert!(tracker.try_reserve(user, 400 * 1024 * 1024, 1));
	}
}
