//! The `/api/live/ws` upgrade handler and per-connection read loop. One task per connection owns inbound-message
//! ordering for that connection.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use futures::StreamExt;
use live_auth::AuthContext;
use live_common::{framing, ClientMessage, ConnectionId, RoomId, ServerMessage};
use live_connections::{Connection, SendOptions, SendTarget};
use live_registry::{RegistryError, ROOM_KIND};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::transport::WsTransport;
use crate::rate_limit::{self, ConnectionRateLimiter};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
	Router::new().route("/api/live/ws", get(upgrade))
}

async fn upgrade(
	ws: WebSocketUpgrade,
	State(state): State<AppState>,
	Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
	let token = params.get("token").cloned();
	ws.on_upgrade(move |socket| handle_socket(socket, state, token))
}

async fn handle_socket(socket: WebSocket, state: AppState, token: Option<String>) {
	let auth_context = match &token {
		Some(token) => {
			state
				.auth_gate
				.authenticate(Some(&json!({ "token": token })), None)
				.await
		}
		None => AuthContext::Anonymous,
	};
	let mut user_id = auth_context.user_id();

	let (sink, mut stream) = socket.split();
	let transport: Arc<dyn live_connections::Transport> = Arc::new(WsTransport::new(sink));
	let connection = match state.connections.register(user_id, transport) {
		Ok(connection) => connection,
		Err(err) => {
			warn!(%err, "rejected connection");
			return;
		}
	};

	state.debug.record("websocket", format!("connection {} opened", connection.id));
	if state.live_logging.is_enabled("websocket") {
		tracing::info!(connection = %connection.id, "websocket connection opened");
	}

	let established = ServerMessage::ConnectionEstablished {
		connection_id: connection.id.to_string(),
		authenticated: auth_context.is_authenticated(),
		user_id: user_id.map(|u| u.to_string()),
		features: vec!["rooms".into(), "uploads".into(), "rehydration".into()],
	};
	reply(&state, connection.id, &established).await;

	let limiter = rate_limit::new_connection_limiter();
	let mut auth_context = auth_context;

	while let Some(frame) = stream.next().await {
		let message = match frame {
			Ok(message) => message,
			Err(err) => {
				debug!(connection = %connection.id, %err, "websocket read error");
				break;
			}
		};

		match message {
			Message::Text(text) => {
				handle_text_frame(
					&state,
					&connection,
					&limiter,
					&mut auth_context,
					&mut user_id,
					&text,
				)
				.await;
			}
			Message::Binary(bytes) => {
				handle_binary_frame(&state, &connection, &limiter, &bytes).await;
			}
			Message::Pong(_) => connection.record_pong(crate::now_ms()),
			Message::Ping(_) => {}
			Message::Close(_) => break,
		}
	}

	state.debug.record("websocket", format!("connection {} closed", connection.id));
	if state.live_logging.is_enabled("websocket") {
		tracing::info!(connection = %connection.id, "websocket connection closed");
	}
	state.connections.unregister(connection.id);
	state.registry.unmount_connection(connection.id).await;
}

async fn handle_text_frame(
	state: &AppState,
	connection: &Arc<Connection>,
	limiter: &ConnectionRateLimiter,
	auth_context: &mut AuthContext,
	user_id: &mut Option<live_common::UserId>,
	text: &str,
) {
	let message: ClientMessage = match serde_json::from_str(text) {
		Ok(message) => message,
		Err(err) => {
			reply(
				state,
				connection.id,
				&ServerMessage::Error {
					error: format!("invalid message: {err}"),
					request_id: None,
				},
			)
			.await;
			return;
		}
	};

	if limiter.check().is_err() {
		reply(
			state,
			connection.id,
			&ServerMessage::Error {
				error: "RATE_LIMITED".to_string(),
				request_id: message.request_id().map(str::to_string),
			},
		)
		.await;
		return;
	}

	if state.live_logging.is_enabled("messages") {
		debug!(connection = %connection.id, ?message, "dispatching message");
	}

	dispatch(state, connection, auth_context, user_id, message).await;
}

async fn handle_binary_frame(
	state: &AppState,
	connection: &Arc<Connection>,
	limiter: &ConnectionRateLimiter,
	frame: &[u8],
) {
	if limiter.check().is_err() {
		reply(
			state,
			connection.id,
			&ServerMessage::Error {
				error: "RATE_LIMITED".to_string(),
				request_id: None,
			},
		)
		.await;
		return;
	}

	let (header, payload) = match framing::decode_chunk_frame(frame) {
		Ok(decoded) => decoded,
		Err(err) => {
			reply(
				state,
				connection.id,
				&ServerMessage::Error {
					error: format!("invalid chunk frame: {err}"),
					request_id: None,
				},
			)
			.await;
			return;
		}
	};

	let now_ms = crate::now_ms();
	if let Err(err) = state
		.uploads
		.chunk(header.upload_id, header.chunk_index, payload.to_vec(), now_ms)
		.await
	{
		reply(
			state,
			connection.id,
			&ServerMessage::Error {
				error: err.to_string(),
				request_id: header.request_id,
			},
		)
		.await;
	}
}

/// Routes one already rate-limited [`ClientMessage`] to the owning subsystem and
/// emits whatever response(s) that message's contract calls for.
async fn dispatch(
	state: &AppState,
	connection: &Arc<Connection>,
	auth_context: &mut AuthContext,
	user_id: &mut Option<live_common::UserId>,
	message: ClientMessage,
) {
	let now_ms = crate::now_ms();
	let connection_id = connection.id;

	match message {
		ClientMessage::ComponentMount {
			payload,
			request_id,
			..
		} => {
			let room_id = payload.room_id.clone();
			let result = state
				.registry
				.mount(
					&payload.component,
					payload.props,
					connection_id,
					*user_id,
					auth_context.clone(),
					room_id,
					now_ms,
				)
				.await;
			let response = match result {
				Ok(mount) => ServerMessage::ComponentMounted {
					success: true,
					result: Some(json!({
						"componentId": mount.component_id,
						"initialState": mount.state,
						"signedState": mount.signed_state,
					})),
					error: None,
					request_id,
				},
				Err(err) => ServerMessage::ComponentMounted {
					success: false,
					result: None,
					error: Some(err.to_string()),
					request_id,
				},
			};
			reply(state, connection_id, &response).await;
		}

		ClientMessage::ComponentRehydrate {
			component_name,
			signed_state,
			request_id,
			..
		} => {
			let result = state
				.registry
				.rehydrate(
					&component_name,
					&signed_state,
					connection_id,
					*user_id,
					auth_context.clone(),
					None,
					now_ms,
				)
				.await;
			let response = match result {
				Ok(outcome) => ServerMessage::ComponentRehydrated {
					success: true,
					result: Some(json!({ "newComponentId": outcome.new_component_id })),
					error: None,
					request_id,
				},
				Err(err) => ServerMessage::ComponentRehydrated {
					success: false,
					result: None,
					error: Some(err.to_string()),
					request_id,
				},
			};
			reply(state, connection_id, &response).await;
		}

		ClientMessage::ComponentUnmount {
			component_id,
			request_id,
		} => {
			let result = state.registry.unmount(component_id).await;
			reply(state, connection_id, &ack(result, request_id)).await;
		}

		ClientMessage::CallAction {
			component_id,
			action,
			payload,
			request_id,
			expect_response,
		} => {
			let wants_response = expect_response || request_id.is_some();
			match state
				.registry
				.call_action(component_id, &action, payload, now_ms)
				.await
			{
				Ok(outcome) => {
					if wants_response {
						reply(
							state,
							connection_id,
							&ServerMessage::ActionResponse {
								component_id,
								success: true,
								result: Some(outcome.result),
								error: None,
								request_id: request_id.clone(),
							},
						)
						.await;
					}
					reply(
						state,
						connection_id,
						&ServerMessage::StateUpdate {
							component_id,
							state: outcome.state,
							signed_state: Some(outcome.signed_state),
						},
					)
					.await;
				}
				Err(err) => {
					if wants_response {
						reply(
							state,
							connection_id,
							&ServerMessage::ActionResponse {
								component_id,
								success: false,
								result: None,
								error: Some(err.to_string()),
								request_id,
							},
						)
						.await;
					} else {
						reply(
							state,
							connection_id,
							&ServerMessage::Error {
								error: err.to_string(),
								request_id: None,
							},
						)
						.await;
					}
				}
			}
		}

		ClientMessage::PropertyUpdate {
			component_id,
			property,
			value,
			request_id,
		} => match state.registry.set_property(component_id, &property, value, now_ms).await {
			Ok(outcome) => {
				reply(
					state,
					connection_id,
					&ServerMessage::StateUpdate {
						component_id,
						state: outcome.state,
						signed_state: Some(outcome.signed_state),
					},
				)
				.await;
			}
			Err(err) => {
				reply(
					state,
					connection_id,
					&ServerMessage::Error {
						error: err.to_string(),
						request_id,
					},
				)
				.await;
			}
		},

		ClientMessage::ComponentPing { component_id } => {
			if let Some(instance) = state.registry.get(component_id) {
				instance.touch(now_ms);
			}
		}

		ClientMessage::Auth {
			provider,
			credentials,
			request_id,
		} => {
			let ctx = state
				.auth_gate
				.authenticate(Some(&credentials), provider.as_deref())
				.await;
			*user_id = ctx.user_id();
			*auth_context = ctx;
			reply(
				state,
				connection_id,
				&ServerMessage::Ack {
					success: auth_context.is_authenticated(),
					error: None,
					request_id,
				},
			)
			.await;
		}

		ClientMessage::FileUploadStart {
			upload_id,
			component_id,
			filename,
			mime_type,
			declared_size,
			total_chunks,
			request_id,
		} => {
			let result = state.uploads.start(
				upload_id,
				component_id,
				*user_id,
				filename,
				mime_type,
				declared_size,
				total_chunks,
				now_ms,
			);
			reply(state, connection_id, &ack_upload(result, request_id)).await;
		}

		ClientMessage::FileUploadChunk {
			upload_id,
			chunk_index,
			data,
		} => {
			let decode = BASE64.decode(data.as_bytes());
			match decode {
				Ok(bytes) => {
					if let Err(err) = state.uploads.chunk(upload_id, chunk_index, bytes, now_ms).await {
						reply(
							state,
							connection_id,
							&ServerMessage::Error {
								error: err.to_string(),
								request_id: None,
							},
						)
						.await;
					}
				}
				Err(err) => {
					reply(
						state,
						connection_id,
						&ServerMessage::Error {
							error: format!("invalid base64 chunk payload: {err}"),
							request_id: None,
						},
					)
					.await;
				}
			}
		}

		ClientMessage::FileUploadComplete {
			upload_id,
			request_id,
		} => {
			let response = match state.uploads.complete(upload_id).await {
				Ok(file_url) => ServerMessage::FileUploadComplete {
					success: true,
					file_url: Some(file_url),
					error: None,
					request_id,
				},
				Err(err) => ServerMessage::FileUploadComplete {
					success: false,
					file_url: None,
					error: Some(err.to_string()),
					request_id,
				},
			};
			reply(state, connection_id, &response).await;
		}

		ClientMessage::RoomJoin {
			room_id,
			component_id,
			request_id,
		} => {
			let decision = state.auth_gate.authorize_room(&*auth_context, room_id.as_str()).await;
			if !decision.allowed {
				reply(
					state,
					connection_id,
					&ServerMessage::Ack {
						success: false,
						error: Some(decision.reason),
						request_id,
					},
				)
				.await;
				return;
			}
			state
				.rooms
				.join(ROOM_KIND, &room_id, component_id, connection_id, now_ms)
				.await;
			reply(
				state,
				connection_id,
				&ServerMessage::Ack {
					success: true,
					error: None,
					request_id,
				},
			)
			.await;
		}

		ClientMessage::RoomLeave { room_id, component_id } => {
			state.rooms.leave(ROOM_KIND, &room_id, component_id).await;
		}

		ClientMessage::RoomEmit { room_id, event, data } => {
			emit_room_event(state, connection_id, &room_id, &event, data).await;
		}

		ClientMessage::RoomStateSet { room_id, delta } => {
			if let Err(err) = state
				.rooms
				.set_room_state(
					ROOM_KIND,
					&room_id,
					delta,
					Some(connection_id),
					now_ms,
					state.deliverer.as_ref(),
				)
				.await
			{
				reply(
					state,
					connection_id,
					&ServerMessage::Error {
						error: err.to_string(),
						request_id: None,
					},
				)
				.await;
			}
		}
	}
}

async fn emit_room_event(state: &AppState, sender: ConnectionId, room_id: &RoomId, event: &str, data: Value) {
	state.rooms.bus.emit(ROOM_KIND, room_id, event, data.clone()).await;

	let payload = match serde_json::to_vec(&ServerMessage::RoomEvent {
		room_id: room_id.clone(),
		event: event.to_string(),
		data,
	}) {
		Ok(bytes) => Bytes::from(bytes),
		Err(err) => {
			warn!(%err, "failed to serialize ROOM_EVENT");
			return;
		}
	};

	if let Err(err) = state
		.rooms
		.broadcast(ROOM_KIND, room_id, payload, Some(sender), state.deliverer.as_ref())
		.await
	{
		reply(
			state,
			sender,
			&ServerMessage::Error {
				error: err.to_string(),
				request_id: None,
			},
		)
		.await;
	}
}

fn ack(result: Result<(), RegistryError>, request_id: Option<String>) -> ServerMessage {
	match result {
		Ok(()) => ServerMessage::Ack {
			success: true,
			error: None,
			request_id,
		},
		Err(err) => ServerMessage::Ack {
			success: false,
			error: Some(err.to_string()),
			request_id,
		},
	}
}

fn ack_upload(result: Result<(), live_uploads::UploadError>, request_id: Option<String>) -> ServerMessage {
	match result {
		Ok(()) => ServerMessage::Ack {
			success: true,
			error: None,
			request_id,
		},
		Err(err) => ServerMessage::Ack {
			success: false,
			error: Some(err.to_string()),
			request_id,
		},
	}
}

async fn reply(state: &AppState, connection_id: ConnectionId, message: &ServerMessage) {
	let Ok(encoded) = serde_json::to_vec(message) else {
		warn!("failed to serialize outgoing server message");
		return;
	};
	let _ = state
		.connections
		.send(
			Bytes::from(encoded),
			SendTarget::Connection(connection_id),
			SendOptions {
				queue_if_offline: true,
				..Default::default()
			},
		)
		.await;
}
