//! Room Manager: create-on-first-join, membership, broadcast,
//! shared-state updates and the empty-room destruction sweep. Built on the same
//! `replicate-server::instance::InstanceManager` `DashMap` singleton
//! pattern, generalized with per-room interior locking for broadcast ordering.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use live_common::{ComponentId, ConnectionId, RoomId};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::bus::EventBus;
use crate::deliverer::RoomDeliverer;
use crate::error::RoomError;
use crate::room::{Membership, Room, MAX_ROOM_STATE_BYTES};

/// Destroy rooms 5 minutes after they empty.
pub const EMPTY_ROOM_TTL: Duration = Duration::from_secs(5 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

pub struct RoomManager {
	rooms: DashMap<(String, RoomId), Arc<Room>>,
	pub bus: EventBus,
}

impl RoomManager {
	pub fn new() -> Self {
		Self {
			rooms: DashMap::new(),
			bus: EventBus::new(),
		}
	}

	fn get_or_create(&self, kind: &str, room_id: &RoomId, now_ms: u64) -> Arc<Room> {
		Arc::clone(
			self.rooms
				.entry((kind.to_string(), room_id.clone()))
				.or_insert_with(|| {
					debug!(%kind, %room_id, "created room");
					Arc::new(Room::new(kind, room_id.clone(), now_ms))
				}),
		)
	}

	/// Create rooms on first join; track membership.
	#[instrument(skip(self))]
	pub async fn join(
		&self,
		kind: &str,
		room_id: &RoomId,
		component_id: ComponentId,
		connection_id: ConnectionId,
		now_ms: u64,
	) {
		let room = self.get_or_create(kind, room_id, now_ms);
		let mut state = room.state.lock().await;
		state.members.insert(
			component_id,
			Membership {
				connection_id,
				joined_at_ms: now_ms,
			},
		);
		state.last_activity_ms = now_ms;
		state.empty_since = None;
	}

	/// Removes `component_id` from a single room; returns `true` if the room is now
	/// empty (caller may want to know for logging, the sweep handles destruction).
	pub async fn leave(&self, kind: &str, room_id: &RoomId, component_id: ComponentId) -> bool {
		let Some(room) = self
			.rooms
			.get(&(kind.to_string(), room_id.clone()))
			.map(|r| Arc::clone(&r))
		else {
			return true;
		};
		let mut state = room.state.lock().await;
		state.members.remove(&component_id);
		let empty = state.members.is_empty();
		if empty && state.empty_since.is_none() {
			state.empty_since = Some(Instant::now());
		}
		empty
	}

	/// Cleanup: removes `component_id` from every room it belongs to
	/// and drops all its bus subscriptions.
	pub async fn cleanup_component(&self, component_id: ComponentId) {
		let keys: Vec<(String, RoomId)> = self.rooms.iter().map(|e| e.key().clone()).collect();
		for (kind, room_id) in keys {
			self.leave(&kind, &room_id, component_id).await;
		}
		self.bus.cleanup_component(component_id);
	}

	/// Broadcast to a room (optionally excluding the sender). The room's
	/// lock is held across delivery so a single emit's deliveries are ordered and
	/// cannot interleave with a concurrent emit to the same room.
	pub async fn broadcast(
		&self,
		kind: &str,
		room_id: &RoomId,
		payload: Bytes,
		exclude: Option<ConnectionId>,
		deliverer: &dyn RoomDeliverer,
	) -> Result<(), RoomError> {
		let Some(room) = self
			.rooms
			.get(&(kind.to_string(), room_id.clone()))
			.map(|r| Arc::clone(&r))
		else {
			return Err(RoomError::NotFound(kind.to_string(), room_id.to_string()));
		};
		let state = room.state.lock().await;
		for membership in state.members.values() {
			if Some(membership.connection_id) == exclude {
				continue;
			}
			deliverer.deliver(membership.connection_id, payload.clone()).await;
		}
		Ok(())
	}

	/// State updates: shallow merge, size-validate, replace, then emit
	/// `$state:update` carrying only the delta to all members except the sender.
	pub async fn set_room_state(
		&self,
		kind: &str,
		room_id: &RoomId,
		delta: serde_json::Map<String, Value>,
		sender: Option<ConnectionId>,
		now_ms: u64,
		deliverer: &dyn RoomDeliverer,
	) -> Result<(), RoomError> {
		let room = self.get_or_create(kind, room_id, now_ms);
		let event_payload = {
			let mut state = room.state.lock().await;
			for (key, value) in delta.iter() {
				state.data.insert(key.clone(), value.clone());
			}
			let serialized_len = serde_json::to_vec(&state.data)?.len();
			if serialized_len > MAX_ROOM_STATE_BYTES {
				for key in delta.keys() {
					state.data.remove(key);
				}
				return Err(RoomError::StateTooLarge(serialized_len));
			}
			state.last_activity_ms = now_ms;
			Value::Object(delta)
		};

		self.bus
			.emit(kind, room_id, "$state:update", event_payload.clone())
			.await;

		let payload = Bytes::from(serde_json::to_vec(&event_payload)?);
		self.broadcast(kind, room_id, payload, sender, deliverer)
			.await
	}

	pub fn room_count(&self) -> usize {
		self.rooms.len()
	}

	pub async fn member_count(&self, kind: &str, room_id: &RoomId) -> usize {
		match self.rooms.get(&(kind.to_string(), room_id.clone())) {
			Some(room) => room.state.lock().await.members.len(),
			None => 0,
		}
	}

	/// Destroy rooms 5 minutes after they empty. Runs as a periodic
	/// sweep rather than one timer per room so a rejoin only has to clear
	/// `empty_since`, which this sweep then simply never acts on.
	pub fn spawn_cleanup_sweep(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
		let manager = Arc::clone(self);
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
			loop {
				ticker.tick().await;
				let mut expired = Vec::new();
				for entry in manager.rooms.iter() {
					let room = entry.value();
					let state = room.state.lock().await;
					if let Some(empty_since) = state.empty_since {
						if empty_since.elapsed() >= EMPTY_ROOM_TTL {
							expired.push(entry.key().clone());
						}
					}
				}
				for key in expired {
					manager.rooms.remove(&key);
					info!(kind = %key.0, room = %key.1, "destroyed empty room");
				}
			}
		})
	}
}

impl Default for RoomManager {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use parking_lot::Mutex as SyncMutex;

	struct RecordingDeliverer {
		deliveries: SyncMutex<Vec<(ConnectionId, Bytes)>>,
	}

	impl RecordingDeliverer {
		fn new() -> Self {
			Self {
				deliveries: SyncMutex::new(Vec::new()),
			}
		}
	}

	#[async_trait::async_trait]
	impl RoomDeliverer for RecordingDeliverer {
		async fn deliver(&self, connection_id: ConnectionId, payload: Bytes) {
			self.deliveries.lock().push((connection_id, payload));
		}
	}

	fn room_id(name: &str) -> RoomId {
		RoomId::new(name).unwrap()
	}

	#[tokio::test]
	async fn join_creates_room_and_tracks_membership() {
		let mgr = RoomManager::new();
		let component = ComponentId::random();
		let connection = ConnectionId::random();
		mgr.join("chat", &room_id("chat:7"), component, connection, 0)
			.await;
		assert_eq!(mgr.member_count("chat", &room_id("chat:7")).await, 1);
	}

	#[tokio::test]
	async fn broadcast_excludes_sender() {
		let mgr = RoomManager::new();
		let a = (ComponentId::random(), ConnectionId::random());
		let b = (ComponentId::random(), ConnectionId::random());
		mgr.join("chat", &room_id("chat:7"), a.0, a.1, 0).await;
		mgr.join("chat", &room_id("chat:7"), b.0, b.1, 0).await;

		let deliverer = RecordingDeliverer::new();
		mgr.broadcast(
			"chat",
			&room_id("chat:7"),
			Bytes::from_static(b"hi"),
			Some(a.1),
			&deliverer,
		)
		.await
		.unwrap();

		let deliveries = deliverer.deliveries.lock();
		assert_eq!(deliveries.len(), 1);
		assert_eq!(deliveries[0].0, b.1);
	}

	#[tokio::test]
	async fn set_room_state_rejects_oversized_delta() {
		let mgr = RoomManager::new();
		let mut delta = serde_json::Map::new();
		delta.insert("blob".to_string(), Value::String("x".repeat(MAX_ROOM_STATE_BYTES + 1)));
		let deliverer = RecordingDeliverer::new();
		let err = mgr
			.set_room_state("chat", &room_id("chat:7"), delta, None, 0, &deliverer)
			.await
			.unwrap_err();
		assert!(matches!(err, RoomError::StateTooLarge(_)));
	}

	#[tokio::test]
	async fn leave_marks_room_empty() {
		let mgr = RoomManager::new();
		let component = ComponentId::random();
		let connection = ConnectionId::random();
		mgr.join("chat", &room_id("chat:7"), component, connection, 0)
			.await;
		let empty = mgr.leave("chat", &room_id("chat:7"), component).await;
		assert!(empty);
		assert_eq!(mgr.member_count("chat", &room_id("chat:7")).await, 0);
	}

	#[tokio::test]
	async fn cleanup_component_removes_from_all_rooms() {
		let mgr = RoomManager::new();
		let component = ComponentId::random();
		let connection = ConnectionId::random();
		mgr.join("chat", &room_id("chat:1"), component, connection, 0)
			.await;
		mgr.join("chat", &room_id("chat:2"), component, connection, 0)
			.await;
		mgr.cleanup_component(component).await;
		assert_eq!(mgr.member_count("chat", &room_id("chat:1")).await, 0);
		assert_eq!(mgr.member_count("chat", &room_id("chat:2")).await, 0);
	}
}
