//! Named groups of connections plus the three load-balancing strategies over them
//!. Only connections whose transport reports open are
//! eligible for selection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use live_common::ConnectionId;
use parking_lot::RwLock;
use rand::seq::SliceRandom;

use crate::connection::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBalanceStrategy {
	RoundRobin,
	LeastConnections,
	Random,
}

#[derive(Default)]
pub struct Pool {
	members: RwLock<Vec<ConnectionId>>,
	round_robin_cursor: AtomicUsize,
}

impl Pool {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&self, id: ConnectionId) {
		let mut members = self.members.write();
		if !members.contains(&id) {
			members.push(id);
		}
	}

	pub fn remove(&self, id: ConnectionId) {
		self.members.write().retain(|m| *m != id);
	}

	pub fn members(&self) -> Vec<ConnectionId> {
		self.members.read().clone()
	}

	/// Selects one open connection from `resolve` (the manager's connection lookup)
	/// using `strategy`. Returns `None` if the pool has no currently-open member.
	pub fn select(
		&self,
		strategy: LoadBalanceStrategy,
		resolve: impl Fn(ConnectionId) -> Option<Arc<Connection>>,
	) -> Option<Arc<Connection>> {
		let members = self.members.read().clone();
		let open: Vec<Arc<Connection>> = members
			.into_iter()
			.filter_map(&resolve)
			.filter(|c| c.is_open())
			.collect();
		if open.is_empty() {
			return None;
		}

		match strategy {
			LoadBalanceStrategy::RoundRobin => {
				let idx = self.round_robin_cursor.fetch_add(1, Ordering::Relaxed) % open.len();
				Some(Arc::clone(&open[idx]))
			}
			LoadBalanceStrategy::LeastConnections => open
				.into_iter()
				.min_by_key(|c| c.load_score())
				.map(|c| c),
			LoadBalanceStrategy::Random => {
				let mut rng = rand::thread_rng();
				open.choose(&mut rng).cloned()
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::transport::Transport;
	use async_trait::async_trait;
	use bytes::Bytes;
	use std::sync::atomic::AtomicBool;

	struct FakeTransport(AtomicBool);

	#[async_trait]
	impl Transport for FakeTransport {
		fn is_open(&self) -> bool {
			self.0.load(Ordering::Relaxed)
		}
		async fn send(&self, _payload: Bytes) -> Result<(), String> {
			Ok(())
		}
		async fn ping(&self) -> Result<(), String> {
			Ok(())
		}
		async fn close(&self) {
			self.0.store(false, Ordering::Relaxed);
		}
	}

	fn connection(open: bool) -> Arc<Connection> {
		Arc::new(Connection::new(
			ConnectionId::random(),
			None,
			Arc::new(FakeTransport(AtomicBool::new(open))),
		))
	}

	#[test]
	fn round_robin_skips_closed_members() {
		let pool = Pool::new();
		let a = connection(true);
		let b = connection(false);
		let c = connection(true);
		pool.add(a.id);
		pool.add(b.id);
		pool.add(c.id);

		let lookup = |id: ConnectionId| -> Option<Arc<Connection>> {
			[&a, &b, &c]
				.into_iter()
				.find(|conn| conn.id == id)
				.cloned()
		};

		for _ in 0..4 {
			let picked = pool.select(LoadBalanceStrategy::RoundRobin, lookup).unwrap();
			assert!(picked.id == a.id || picked.id == c.id);
		}
	}

	#[test]
	fn empty_pool_selects_none() {
		let pool = Pool::new();
		assert!(pool
			.select(LoadBalanceStrategy::Random, |_| None)
			.is_none());
	}
}
