//! Capability trait abstracting over the concrete socket. `apps/live-server` implements this over the split
//! sink half of `axum::extract::ws::WebSocket`.

use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait Transport: Send + Sync {
	/// Whether the underlying socket currently reports itself as open/writable.
	fn is_open(&self) -> bool;

	/// Writes a single message frame. Callers are responsible for serialization;
	/// implementations just move bytes.
	async fn send(&self, payload: Bytes) -> Result<(), String>;

	/// Sends a transport-level ping, used by the heartbeat loop.
	async fn ping(&self) -> Result<(), String>;

	/// Actively closes the underlying socket.
	async fn close(&self);
}
