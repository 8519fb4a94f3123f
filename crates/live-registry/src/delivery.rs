//! Adapts [`live_connections::ConnectionManager`] to the capability traits the
//! dependency crates expect, so `live-registry` can compose them without either
//! crate knowing about the other.

use async_trait::async_trait;
use bytes::Bytes;
use live_common::ConnectionId;
use live_connections::{ConnectionManager, SendOptions, SendTarget};
use live_rooms::RoomDeliverer;
use std::sync::Arc;

pub struct ConnectionDeliverer(pub Arc<ConnectionManager>);

#[async_trait]
impl RoomDeliverer for ConnectionDeliverer {
	async fn deliver(&self, connection_id: ConnectionId, payload: Bytes) {
		let _ = self
			.0
			.send(
				payload,
				SendTarget::Connection(connection_id),
				SendOptions {
					queue_if_offline: true,
					..SendOptions::default()
				},
			)
			.await;
	}
}
