//! A single room: membership plus shallow-mergeable shared state.

use std::collections::HashMap;
use std::time::Instant;

use live_common::{ComponentId, ConnectionId, RoomId};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

/// Serialized room state ceiling.
pub const MAX_ROOM_STATE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Membership {
	pub connection_id: ConnectionId,
	pub joined_at_ms: u64,
}

#[derive(Debug, Default)]
pub struct RoomState {
	pub data: Map<String, Value>,
	pub members: HashMap<ComponentId, Membership>,
	pub created_at_ms: u64,
	pub last_activity_ms: u64,
	/// Set when the room transitions to empty; cleared on any join. The sweep only
	/// destroys rooms that have stayed empty continuously since this was set.
	pub empty_since: Option<Instant>,
}

pub struct Room {
	pub id: RoomId,
	pub kind: String,
	pub state: Mutex<RoomState>,
}

impl Room {
	pub fn new(kind: impl Into<String>, id: RoomId, now_ms: u64) -> Self {
		Self {
			id,
			kind: kind.into(),
			state: Mutex::new(RoomState {
				created_at_ms: now_ms,
				last_activity_ms: now_ms,
				empty_since: Some(Instant::now()),
				..RoomState::default()
			}),
		}
	}
}
