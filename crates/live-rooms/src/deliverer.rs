//! Decouples room broadcast from the concrete connection transport, the same way
//! `live-connections::Transport` decouples a connection from its socket. The
//! dispatcher wires a `RoomDeliverer` backed by a `live_connections::ConnectionManager`.

use async_trait::async_trait;
use bytes::Bytes;
use live_common::ConnectionId;

#[async_trait]
pub trait RoomDeliverer: Send + Sync {
	async fn deliver(&self, connection_id: ConnectionId, payload: Bytes);
}
