//! End-to-end scenario tests driving the real `/api/live/ws` upgrade over an
//! actual TCP socket: a handful of true integration tests alongside per-crate
//! unit coverage, rather than one monolithic suite.

use clap::Parser as _;
use futures::{SinkExt, StreamExt};
use live_server::{router, AppState, Config};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

async fn spawn_server() -> u16 {
	spawn_server_with(|_state| {}).await
}

async fn spawn_server_with(customize: impl FnOnce(&AppState)) -> u16 {
	let mut config = Config::parse_from(["live-server"]);
	config.bind = "127.0.0.1".parse().unwrap();
	config.port = 0;
	let state = AppState::build(&config);
	customize(&state);
	let app = router(state);

	let listener = tokio::net::TcpListener::bind((config.bind, config.port)).await.unwrap();
	let port = listener.local_addr().unwrap().port();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	port
}

async fn connect(port: u16) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
	let url = format!("ws://127.0.0.1:{port}/api/live/ws");
	let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
	stream
}

async fn send_json(
	stream: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
	value: &Value,
) {
	stream
		.send(Message::Text(serde_json::to_string(value).unwrap()))
		.await
		.unwrap();
}

async fn recv_json(
	stream: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
) -> Value {
	loop {
		match stream.next().await.unwrap().unwrap() {
			Message::Text(text) => return serde_json::from_str(&text).unwrap(),
			_ => continue,
		}
	}
}

/// Reads frames until one with the given `type` tag arrives, ignoring the rest
/// (e.g. `CONNECTION_ESTABLISHED` and incidental `STATE_UPDATE`s).
async fn recv_until(
	stream: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
	message_type: &str,
) -> Value {
	loop {
		let value = recv_json(stream).await;
		if value.get("type").and_then(Value::as_str) == Some(message_type) {
			return value;
		}
	}
}

/// Scenario 1: mount then call an action, expecting both an `ACTION_RESPONSE`
/// and a following `STATE_UPDATE`.
#[tokio::test]
async fn mount_then_call_action() {
	let port = spawn_server().await;
	let mut ws = connect(port).await;

	let _established = recv_until(&mut ws, "CONNECTION_ESTABLISHED").await;

	send_json(
		&mut ws,
		&json!({
			"type": "COMPONENT_MOUNT",
			"component": "Counter",
			"props": {"start": 5},
			"requestId": "r1",
		}),
	)
	.await;
	let mounted = recv_until(&mut ws, "COMPONENT_MOUNTED").await;
	assert_eq!(mounted["success"], json!(true));
	let component_id = mounted["result"]["componentId"].as_str().unwrap().to_string();
	assert_eq!(mounted["result"]["initialState"]["value"], json!(5));

	send_json(
		&mut ws,
		&json!({
			"type": "CALL_ACTION",
			"componentId": component_id,
			"action": "increment",
			"payload": {"by": 3},
			"expectResponse": true,
			"requestId": "r2",
		}),
	)
	.await;
	let response = recv_until(&mut ws, "ACTION_RESPONSE").await;
	assert_eq!(response["success"], json!(true));
	assert_eq!(response["result"]["value"], json!(8));

	let update = recv_until(&mut ws, "STATE_UPDATE").await;
	assert_eq!(update["state"]["value"], json!(8));
}

/// Scenario 4: two connections join the same room; an emit from one is
/// delivered to the other but not echoed back to the sender.
#[tokio::test]
async fn room_emit_reaches_other_members_only() {
	let port = spawn_server().await;
	let mut a = connect(port).await;
	let mut b = connect(port).await;
	recv_until(&mut a, "CONNECTION_ESTABLISHED").await;
	recv_until(&mut b, "CONNECTION_ESTABLISHED").await;

	for ws in [&mut a, &mut b] {
		send_json(
			ws,
			&json!({"type": "COMPONENT_MOUNT", "component": "Cart", "props": {}, "requestId": "m"}),
		)
		.await;
		recv_until(ws, "COMPONENT_MOUNTED").await;
	}

	send_json(
		&mut a,
		&json!({"type": "ROOM_JOIN", "roomId": "chat:7", "componentId": "00000000-0000-0000-0000-000000000000", "requestId": "j1"}),
	)
	.await;
	// componentId on join need not resolve to a mounted instance for room
	// membership bookkeeping, so a throwaway id is fine here.
	recv_until(&mut a, "ACK").await;

	send_json(
		&mut b,
		&json!({"type": "ROOM_JOIN", "roomId": "chat:7", "componentId": "00000000-0000-0000-0000-000000000001", "requestId": "j2"}),
	)
	.await;
	recv_until(&mut b, "ACK").await;

	send_json(
		&mut a,
		&json!({"type": "ROOM_EMIT", "roomId": "chat:7", "event": "message", "data": {"text": "hi"}}),
	)
	.await;

	let event = recv_until(&mut b, "ROOM_EVENT").await;
	assert_eq!(event["event"], json!("message"));
	assert_eq!(event["data"]["text"], json!("hi"));
}

/// Scenario 6: an unauthenticated connection denied a role-gated mount.
#[tokio::test]
async fn mount_denied_without_required_role() {
	let port = spawn_server_with(|state| {
		state.registry.register_auth_rules(
			"Counter",
			live_auth::ComponentAuthRules {
				mount: live_auth::MountRule {
					required: true,
					roles: vec!["admin".to_string()],
					permissions: vec![],
				},
				actions: Default::default(),
			},
		);
	})
	.await;
	let mut ws = connect(port).await;
	recv_until(&mut ws, "CONNECTION_ESTABLISHED").await;

	send_json(
		&mut ws,
		&json!({"type": "COMPONENT_MOUNT", "component": "Counter", "props": {}, "requestId": "r1"}),
	)
	.await;
	let mounted = recv_until(&mut ws, "COMPONENT_MOUNTED").await;
	assert_eq!(mounted["success"], json!(false));
	assert!(mounted["error"].as_str().unwrap().contains("AUTH_DENIED"));
}
