//! [`live_connections::Transport`] over an axum WebSocket's write half. The
//! server only ever sends JSON `ServerMessage`s or binary chunk frames; both
//! arrive here as already-encoded [`bytes::Bytes`] and are forwarded as
//! `Message::Text` or `Message::Binary` accordingly.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::SinkExt;
use live_connections::Transport;
use tokio::sync::Mutex;

pub struct WsTransport {
	sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsTransport {
	pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
		Self {
			sink: Mutex::new(sink),
		}
	}
}

#[async_trait]
impl Transport for WsTransport {
	fn is_open(&self) -> bool {
		// The split sink has no synchronous open check; closure is only ever
		// discovered by a failed send, at which point the connection manager's
		// health sweep marks it unhealthy and tears it down.
		true
	}

	async fn send(&self, payload: Bytes) -> Result<(), String> {
		let message = match std::str::from_utf8(&payload) {
			Ok(text) => Message::Text(text.to_string()),
			Err(_) => Message::Binary(payload.to_vec()),
		};
		self.sink
			.lock()
			.await
			.send(message)
			.await
			.map_err(|err| err.to_string())
	}

	async fn ping(&self) -> Result<(), String> {
		self.sink
			.lock()
			.await
			.send(Message::Ping(Vec::new()))
			.await
			.map_err(|err| err.to_string())
	}

	async fn close(&self) {
		let _ = self.sink.lock().await.send(Message::Close(None)).await;
	}
}
