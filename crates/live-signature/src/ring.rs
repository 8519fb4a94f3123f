//! Holds the current signing key plus enough history to keep validating envelopes
//! signed under recently-rotated-out keys.

use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::key::{now_ms, SigningKey};

pub struct KeyRing {
	inner: RwLock<Inner>,
	max_key_age: Duration,
	key_retention_count: usize,
}

struct Inner {
	current: SigningKey,
	/// Historical keys, newest first. Does not include `current`.
	history: Vec<SigningKey>,
}

impl KeyRing {
	pub fn new(initial: SigningKey, max_key_age: Duration, key_retention_count: usize) -> Self {
		Self {
			inner: RwLock::new(Inner {
				current: initial,
				history: Vec::new(),
			}),
			max_key_age,
			key_retention_count,
		}
	}

	pub fn current(&self) -> SigningKey {
		self.inner.read().current.clone()
	}

	pub fn current_id(&self) -> String {
		self.inner.read().current.id.clone()
	}

	/// Looks up a key by id, trying the current key first, then history.
	/// Returns `None` if the key has aged out or was never known.
	pub fn find(&self, key_id: &str) -> Option<SigningKey> {
		let inner = self.inner.read();
		if inner.current.id == key_id {
			return Some(inner.current.clone());
		}
		inner.history.iter().find(|k| k.id == key_id).cloned()
	}

	/// Rotates in a fresh key, retaining the previous current key in history, then
	/// prunes history by both max age and max count (whichever is more restrictive).
	pub fn rotate(&self) {
		let mut inner = self.inner.write();
		let retired = std::mem::replace(&mut inner.current, SigningKey::generate());
		info!(new_key_id = %inner.current.id, retired_key_id = %retired.id, "rotated signing key");
		inner.history.insert(0, retired);
		self.prune(&mut inner);
	}

	fn prune(&self, inner: &mut Inner) {
		let now = now_ms();
		let max_age_ms = self.max_key_age.as_millis() as u64;
		inner.history.retain(|k| now.saturating_sub(k.created_at) <= max_age_ms);
		if inner.history.len() > self.key_retention_count {
			let dropped = inner.history.split_off(self.key_retention_count);
			for key in dropped {
				debug!(key_id = %key.id, "dropped signing key past retention count");
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn current_key_is_findable() {
		let ring = KeyRing::new(SigningKey::generate(), Duration::from_secs(3600), 5);
		let current = ring.current();
		assert!(ring.find(&current.id).is_some());
	}

	#[test]
	fn rotation_keeps_old_key_findable_until_retention_exceeded() {
		let ring = KeyRing::new(SigningKey::generate(), Duration::from_secs(3600), 1);
		let first = ring.current();
		ring.rotate();
		assert!(ring.find(&first.id).is_some(), "still within retention count of 1");
		ring.rotate();
		assert!(ring.find(&first.id).is_none(), "evicted past retention count");
	}

	#[test]
	fn unknown_key_id_is_not_found() {
		let ring = KeyRing::new(SigningKey::generate(), Duration::from_secs(3600), 5);
		assert!(ring.find("nonexistent").is_none());
	}
}
