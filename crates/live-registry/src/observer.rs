//! The registry's concrete [`ComponentObserver`]: a closure-shaped handle into the
//! room manager, scoped to one mounted instance's room membership.

use std::sync::Arc;

use async_trait::async_trait;
use live_common::{ComponentId, ConnectionId, RoomId};
use live_rooms::RoomManager;
use serde_json::Value;
use tracing::warn;

use crate::component::ComponentObserver;
use crate::delivery::ConnectionDeliverer;

pub const ROOM_KIND: &str = "component";

pub struct RoomObserver {
	pub rooms: Arc<RoomManager>,
	pub deliverer: Arc<ConnectionDeliverer>,
	pub room_id: RoomId,
	pub component_id: ComponentId,
	pub connection_id: ConnectionId,
}

#[async_trait]
impl ComponentObserver for RoomObserver {
	async fn broadcast_room(&self, event: &str, data: Value) {
		let payload = match serde_json::to_vec(&live_common::ServerMessage::RoomEvent {
			room_id: self.room_id.clone(),
			event: event.to_string(),
			data,
		}) {
			Ok(bytes) => bytes::Bytes::from(bytes),
			Err(err) => {
				warn!(%err, "failed to serialize component-initiated room broadcast");
				return;
			}
		};
		if let Err(err) = self
			.rooms
			.broadcast(
				ROOM_KIND,
				&self.room_id,
				payload,
				None,
				self.deliverer.as_ref(),
			)
			.await
		{
			warn!(component = %self.component_id, room = %self.room_id, %err, "room broadcast from component failed");
		}
	}
}
