//! Short-lived in-memory state backups, snapshotted on every successful sign.
//! Not persistence: these are an in-process safety net, capped per component,
//! with no durable storage behind them.

use std::collections::VecDeque;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use live_common::ComponentId;

/// Per-component cap on retained backups.
const MAX_BACKUPS_PER_COMPONENT: usize = 10;

#[derive(Debug, Clone)]
pub struct StateBackup {
	pub version: u32,
	pub data: serde_json::Value,
	pub checksum: String,
	pub taken_at_ms: u64,
}

#[derive(Default)]
pub struct BackupStore {
	by_component: Mutex<std::collections::HashMap<ComponentId, VecDeque<StateBackup>>>,
}

impl BackupStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn snapshot(&self, component_id: ComponentId, version: u32, data: serde_json::Value) {
		let checksum = checksum_of(&data);
		let mut by_component = self.by_component.lock();
		let deque = by_component.entry(component_id).or_default();
		deque.push_back(StateBackup {
			version,
			data,
			checksum,
			taken_at_ms: crate::key::now_ms(),
		});
		while deque.len() > MAX_BACKUPS_PER_COMPONENT {
			deque.pop_front();
		}
	}

	pub fn latest(&self, component_id: ComponentId) -> Option<StateBackup> {
		self.by_component
			.lock()
			.get(&component_id)
			.and_then(|d| d.back().cloned())
	}

	pub fn history(&self, component_id: ComponentId) -> Vec<StateBackup> {
		self.by_component
			.lock()
			.get(&component_id)
			.map(|d| d.iter().cloned().collect())
			.unwrap_or_default()
	}
}

fn checksum_of(data: &serde_json::Value) -> String {
	let bytes = serde_json::to_vec(data).unwrap_or_default();
	let digest = Sha256::digest(bytes);
	hex::encode(digest)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn keeps_at_most_ten_backups() {
		let store = BackupStore::new();
		let id = ComponentId::random();
		for v in 0..15u32 {
			store.snapshot(id, v, serde_json::json!({ "v": v }));
		}
		assert_eq!(store.history(id).len(), MAX_BACKUPS_PER_COMPONENT);
		assert_eq!(store.latest(id).unwrap().version, 14);
	}
}
