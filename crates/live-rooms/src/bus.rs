//! Server-side pub/sub keyed by `(roomKind, roomId, event)`. Browser clients are reached through [`crate::deliverer::RoomDeliverer`];
//! this bus is only for server-side subscribers such as other components.

use dashmap::DashMap;
use futures::future::BoxFuture;
use live_common::{ComponentId, RoomId};
use serde_json::Value;
use tracing::warn;

pub type Handler = std::sync::Arc<dyn Fn(Value) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct SubscriptionKey {
	kind: String,
	room_id: RoomId,
	event: String,
}

struct Subscription {
	component_id: ComponentId,
	handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
	subscriptions: DashMap<SubscriptionKey, Vec<Subscription>>,
	/// Reverse index so `cleanup_component` doesn't have to scan every key.
	by_component: DashMap<ComponentId, Vec<(String, RoomId, String)>>,
}

impl EventBus {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn subscribe(
		&self,
		kind: impl Into<String>,
		room_id: RoomId,
		event: impl Into<String>,
		component_id: ComponentId,
		handler: Handler,
	) {
		let kind = kind.into();
		let event = event.into();
		let key = SubscriptionKey {
			kind: kind.clone(),
			room_id: room_id.clone(),
			event: event.clone(),
		};
		self.subscriptions
			.entry(key)
			.or_default()
			.push(Subscription {
				component_id,
				handler,
			});
		self.by_component
			.entry(component_id)
			.or_default()
			.push((kind, room_id, event));
	}

	/// Invokes every subscriber for `(kind, room_id, event)` with `payload`.
	/// Handler errors are logged and never stop dispatch to the rest.
	pub async fn emit(&self, kind: &str, room_id: &RoomId, event: &str, payload: Value) {
		let key = SubscriptionKey {
			kind: kind.to_string(),
			room_id: room_id.clone(),
			event: event.to_string(),
		};
		let handlers: Vec<Handler> = match self.subscriptions.get(&key) {
			Some(subs) => subs.iter().map(|s| s.handler.clone()).collect(),
			None => return,
		};
		for handler in handlers {
			if let Err(err) = handler(payload.clone()).await {
				warn!(%kind, %room_id, %event, %err, "room event subscriber failed");
			}
		}
	}

	/// Cleanup: drops every subscription owned by `component_id`.
	pub fn cleanup_component(&self, component_id: ComponentId) {
		let Some((_, keys)) = self.by_component.remove(&component_id) else {
			return;
		};
		for (kind, room_id, event) in keys {
			let key = SubscriptionKey {
				kind,
				room_id,
				event,
			};
			if let Some(mut subs) = self.subscriptions.get_mut(&key) {
				subs.retain(|s| s.component_id != component_id);
			}
		}
	}

	#[cfg(test)]
	pub fn subscriber_count(&self, kind: &str, room_id: &RoomId, event: &str) -> usize {
		let key = SubscriptionKey {
			kind: kind.to_string(),
			room_id: room_id.clone(),
			event: event.to_string(),
		};
		self.subscriptions.get(&key).map(|s| s.len()).unwrap_or(0)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	fn room(name: &str) -> RoomId {
		RoomId::new(name).unwrap()
	}

	#[tokio::test]
	async fn emit_invokes_subscriber_exactly_once() {
		let bus = EventBus::new();
		let calls = Arc::new(AtomicUsize::new(0));
		let calls2 = Arc::clone(&calls);
		bus.subscribe(
			"chat",
			room("chat:7"),
			"message",
			ComponentId::random(),
			Arc::new(move |_v| {
				let calls = Arc::clone(&calls2);
				Box::pin(async move {
					calls.fetch_add(1, Ordering::SeqCst);
					Ok(())
				})
			}),
		);
		bus.emit("chat", &room("chat:7"), "message", Value::Null).await;
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn failing_handler_does_not_stop_dispatch() {
		let bus = EventBus::new();
		let calls = Arc::new(AtomicUsize::new(0));
		bus.subscribe(
			"chat",
			room("chat:7"),
			"message",
			ComponentId::random(),
			Arc::new(|_v| Box::pin(async move { Err("boom".to_string()) })),
		);
		let calls2 = Arc::clone(&calls);
		bus.subscribe(
			"chat",
			room("chat:7"),
			"message",
			ComponentId::random(),
			Arc::new(move |_v| {
				let calls = Arc::clone(&calls2);
				Box::pin(async move {
					calls.fetch_add(1, Ordering::SeqCst);
					Ok(())
				})
			}),
		);
		bus.emit("chat", &room("chat:7"), "message", Value::Null).await;
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn cleanup_component_drops_its_subscriptions() {
		let bus = EventBus::new();
		let component = ComponentId::random();
		bus.subscribe(
			"chat",
			room("chat:7"),
			"message",
			component,
			Arc::new(|_v| Box::pin(async move { Ok(()) })),
		);
		assert_eq!(bus.subscriber_count("chat", &room("chat:7"), "message"), 1);
		bus.cleanup_component(component);
		assert_eq!(bus.subscriber_count("chat", &room("chat:7"), "message"), 0);
	}
}
