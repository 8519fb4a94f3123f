//! The read-mostly HTTP management surface:
//! registry/connection/room/upload stats, performance dashboards, alert
//! resolution and the debug channel. Follows `legacy_web::backend`'s handler
//! style (`Path` extractors, `Json<T>` returns, plain `StatusCode` errors),
//! generalized from file-serving handlers to read-only JSON stats endpoints.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use live_common::ComponentId;
use serde_json::{json, Value};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/api/live/stats", get(stats))
		.route("/api/live/health", get(health))
		.route("/api/live/version", get(version))
		.route("/api/live/connections", get(connections))
		.route("/api/live/connections/:id", get(connection_by_id))
		.route("/api/live/pools/:id/stats", get(pool_stats))
		.route("/api/live/performance/dashboard", get(performance_dashboard))
		.route(
			"/api/live/performance/components/:id",
			get(performance_for_component),
		)
		.route(
			"/api/live/performance/alerts/:id/resolve",
			post(resolve_alert),
		)
		.route("/api/live/debug/ws", get(debug_ws))
		.route("/api/live/debug/snapshot", get(debug_snapshot))
		.route("/api/live/debug/events", get(debug_snapshot))
		.route("/api/live/debug/toggle", post(debug_toggle))
		.route("/api/live/debug/clear", post(debug_clear))
}

async fn version() -> Json<Value> {
	Json(json!({
		"version": env!("CARGO_PKG_VERSION"),
	}))
}

async fn stats(State(state): State<AppState>) -> Json<Value> {
	Json(json!({
		"instances": state.registry.instance_count(),
		"mounted": state.registry.mounted_count(),
		"connections": state.connections.len(),
		"rooms": state.rooms.room_count(),
		"uploadsInFlight": state.uploads.len(),
	}))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
	let uptime_ms = crate::now_ms().saturating_sub(state.started_at_ms);
	Json(json!({
		"status": "ok",
		"uptimeMs": uptime_ms,
		"connections": state.connections.len(),
		"instances": state.registry.instance_count(),
	}))
}

async fn connections(State(state): State<AppState>) -> Json<Value> {
	let items: Vec<Value> = state.connections.all().iter().map(|c| connection_json(c)).collect();
	Json(json!({ "connections": items }))
}

async fn connection_by_id(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
	let id = parse_connection_id(&id)?;
	let connection = state.connections.get(id).ok_or(StatusCode::NOT_FOUND)?;
	Ok(Json(connection_json(&connection)))
}

fn connection_json(connection: &Arc<live_connections::Connection>) -> Value {
	json!({
		"id": connection.id,
		"userId": connection.user_id,
		"open": connection.is_open(),
		"healthy": connection.is_healthy(),
		"messagesSent": connection.metrics.messages_sent(),
		"bytesSent": connection.metrics.bytes_sent.load(std::sync::atomic::Ordering::Relaxed),
		"errorRate": connection.metrics.error_rate(),
		"latencyMs": connection.metrics.latency_ms(),
		"offlineQueueLen": connection.offline_queue.len(),
	})
}

fn parse_connection_id(raw: &str) -> Result<live_common::ConnectionId, StatusCode> {
	raw.parse().map_err(|_| StatusCode::BAD_REQUEST)
}

async fn pool_stats(
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> Result<Json<Value>, StatusCode> {
	let pool = state.connections.pool_if_exists(&name).ok_or(StatusCode::NOT_FOUND)?;
	let members = pool.members();
	let open = members
		.iter()
		.filter(|id| state.connections.get(**id).is_some_and(|c| c.is_open()))
		.count();
	Ok(Json(json!({
		"pool": name,
		"members": members.len(),
		"open": open,
	})))
}

async fn performance_dashboard(State(state): State<AppState>) -> Json<Value> {
	let instances = state.registry.all();
	let components: Vec<Value> = instances.iter().map(|i| performance_json(i)).collect();
	let alerts: Vec<Value> = state
		.alerts
		.all()
		.into_iter()
		.map(|alert| {
			json!({
				"componentId": alert.component_id,
				"className": alert.class_name,
				"raisedAtMs": alert.raised_at_ms,
				"resolved": alert.resolved,
			})
		})
		.collect();
	Json(json!({ "components": components, "alerts": alerts }))
}

async fn performance_for_component(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
	let id: ComponentId = id.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
	let instance = state.registry.get(id).ok_or(StatusCode::NOT_FOUND)?;
	Ok(Json(performance_json(&instance)))
}

fn performance_json(instance: &Arc<live_registry::ComponentInstance>) -> Value {
	let metadata = instance.metadata.lock();
	json!({
		"componentId": instance.id,
		"className": instance.class_name,
		"health": format!("{:?}", metadata.health),
		"lifecycle": format!("{:?}", metadata.lifecycle),
		"mountedAtMs": metadata.mounted_at_ms,
		"lastActivityMs": metadata.last_activity_ms,
		"actionCount": metadata.metrics.action_count,
		"errorCount": metadata.metrics.error_count,
		"renderCount": metadata.metrics.render_count,
		"averageRenderTimeMs": metadata.metrics.average_render_time_ms(),
		"memoryEstimateBytes": metadata.metrics.memory_estimate_bytes,
	})
}

async fn resolve_alert(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
	let id: ComponentId = id.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
	if state.alerts.resolve(id) {
		Ok(Json(json!({ "resolved": true })))
	} else {
		Err(StatusCode::NOT_FOUND)
	}
}

async fn debug_snapshot(State(state): State<AppState>) -> Json<Value> {
	Json(json!({
		"enabled": state.debug.is_enabled(),
		"events": state.debug.snapshot(),
	}))
}

async fn debug_toggle(State(state): State<AppState>) -> Json<Value> {
	let next = !state.debug.is_enabled();
	state.debug.set_enabled(next);
	Json(json!({ "enabled": next }))
}

async fn debug_clear(State(state): State<AppState>) -> Json<Value> {
	state.debug.clear();
	Json(json!({ "cleared": true }))
}

/// Streams the debug feed live over a websocket, one JSON `DebugEvent` per text
/// frame.
async fn debug_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
	ws.on_upgrade(move |socket| debug_feed(socket, state))
}

async fn debug_feed(mut socket: WebSocket, state: AppState) {
	let mut rx = state.debug.subscribe();
	loop {
		tokio::select! {
			event = rx.recv() => {
				let Ok(event) = event else { break };
				let Ok(text) = serde_json::to_string(&event) else { continue };
				if socket.send(Message::Text(text)).await.is_err() {
					break;
				}
			}
			frame = socket.recv() => {
				match frame {
					Some(Ok(Message::Close(_))) | None => break,
					Some(Err(_)) => break,
					_ => {}
				}
			}
		}
	}
}
