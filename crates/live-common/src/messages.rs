//! Tagged JSON message envelopes exchanged over the WebSocket.
//!
//! Follows the same tagged-enum convention as `replicate_common::messages`'
//! `Serverbound`/`Clientbound` types, but tagged on a `type` field
//! (SCREAMING_SNAKE_CASE) to match the wire contract clients expect rather than
//! an internally-tagged enum variant name.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::SignedStateEnvelope;
use crate::ids::{ComponentId, UploadId};
use crate::room_id::RoomId;

/// A message sent from the client to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientMessage {
	#[serde(rename = "COMPONENT_MOUNT")]
	ComponentMount {
		#[serde(flatten)]
		payload: MountPayload,
		#[serde(default)]
		request_id: Option<String>,
		#[serde(default)]
		expect_response: bool,
	},
	#[serde(rename = "COMPONENT_REHYDRATE")]
	ComponentRehydrate {
		old_component_id: String,
		component_name: String,
		signed_state: SignedStateEnvelope,
		#[serde(default)]
		request_id: Option<String>,
	},
	#[serde(rename = "COMPONENT_UNMOUNT")]
	ComponentUnmount {
		component_id: ComponentId,
		#[serde(default)]
		request_id: Option<String>,
	},
	#[serde(rename = "CALL_ACTION")]
	CallAction {
		component_id: ComponentId,
		action: String,
		#[serde(default)]
		payload: Value,
		#[serde(default)]
		request_id: Option<String>,
		#[serde(default)]
		expect_response: bool,
	},
	#[serde(rename = "PROPERTY_UPDATE")]
	PropertyUpdate {
		component_id: ComponentId,
		property: String,
		value: Value,
		#[serde(default)]
		request_id: Option<String>,
	},
	#[serde(rename = "COMPONENT_PING")]
	ComponentPing { component_id: ComponentId },
	#[serde(rename = "AUTH")]
	Auth {
		#[serde(default)]
		provider: Option<String>,
		credentials: Value,
		#[serde(default)]
		request_id: Option<String>,
	},
	#[serde(rename = "FILE_UPLOAD_START")]
	FileUploadStart {
		upload_id: UploadId,
		component_id: ComponentId,
		filename: String,
		mime_type: String,
		declared_size: u64,
		total_chunks: u32,
		#[serde(default)]
		request_id: Option<String>,
	},
	#[serde(rename = "FILE_UPLOAD_CHUNK")]
	FileUploadChunk {
		upload_id: UploadId,
		chunk_index: u32,
		/// Base64-encoded chunk bytes; binary frames carry the chunk out-of-band
		/// instead (see `crate::framing`).
		data: String,
	},
	#[serde(rename = "FILE_UPLOAD_COMPLETE")]
	FileUploadComplete {
		upload_id: UploadId,
		#[serde(default)]
		request_id: Option<String>,
	},
	#[serde(rename = "ROOM_JOIN")]
	RoomJoin {
		room_id: RoomId,
		component_id: ComponentId,
		#[serde(default)]
		request_id: Option<String>,
	},
	#[serde(rename = "ROOM_LEAVE")]
	RoomLeave {
		room_id: RoomId,
		component_id: ComponentId,
	},
	#[serde(rename = "ROOM_EMIT")]
	RoomEmit {
		room_id: RoomId,
		event: String,
		#[serde(default)]
		data: Value,
	},
	#[serde(rename = "ROOM_STATE_SET")]
	RoomStateSet {
		room_id: RoomId,
		delta: serde_json::Map<String, Value>,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountPayload {
	pub component: String,
	#[serde(default)]
	pub props: serde_json::Map<String, Value>,
	#[serde(default)]
	pub room_id: Option<RoomId>,
}

/// A message sent from the server to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
	#[serde(rename = "CONNECTION_ESTABLISHED")]
	ConnectionEstablished {
		connection_id: String,
		authenticated: bool,
		#[serde(default)]
		user_id: Option<String>,
		features: Vec<String>,
	},
	#[serde(rename = "COMPONENT_MOUNTED")]
	ComponentMounted {
		success: bool,
		#[serde(skip_serializing_if = "Option::is_none")]
		result: Option<Value>,
		#[serde(skip_serializing_if = "Option::is_none")]
		error: Option<String>,
		#[serde(default)]
		request_id: Option<String>,
	},
	#[serde(rename = "STATE_UPDATE")]
	StateUpdate {
		component_id: ComponentId,
		state: Value,
		#[serde(skip_serializing_if = "Option::is_none")]
		signed_state: Option<SignedStateEnvelope>,
	},
	#[serde(rename = "ACTION_RESPONSE")]
	ActionResponse {
		component_id: ComponentId,
		success: bool,
		#[serde(skip_serializing_if = "Option::is_none")]
		result: Option<Value>,
		#[serde(skip_serializing_if = "Option::is_none")]
		error: Option<String>,
		#[serde(default)]
		request_id: Option<String>,
	},
	#[serde(rename = "COMPONENT_REHYDRATED")]
	ComponentRehydrated {
		success: bool,
		#[serde(skip_serializing_if = "Option::is_none")]
		result: Option<Value>,
		#[serde(skip_serializing_if = "Option::is_none")]
		error: Option<String>,
		#[serde(default)]
		request_id: Option<String>,
	},
	#[serde(rename = "COMPONENT_RECOVERED")]
	ComponentRecovered { component_id: ComponentId },
	#[serde(rename = "ROOM_EVENT")]
	RoomEvent {
		room_id: RoomId,
		event: String,
		data: Value,
	},
	#[serde(rename = "ERROR")]
	Error {
		error: String,
		#[serde(default)]
		request_id: Option<String>,
	},
	#[serde(rename = "FILE_UPLOAD_COMPLETE")]
	FileUploadComplete {
		success: bool,
		#[serde(skip_serializing_if = "Option::is_none")]
		file_url: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		error: Option<String>,
		#[serde(default)]
		request_id: Option<String>,
	},
	/// Generic success/failure acknowledgement for message kinds with no
	/// dedicated response shape (`AUTH`, `ROOM_JOIN`, `COMPONENT_UNMOUNT`,
	/// `FILE_UPLOAD_START`).
	#[serde(rename = "ACK")]
	Ack {
		success: bool,
		#[serde(skip_serializing_if = "Option::is_none")]
		error: Option<String>,
		#[serde(default)]
		request_id: Option<String>,
	},
}

impl ClientMessage {
	/// The correlating `requestId` carried by this message, if any. Used before a
	/// message is matched on kind, e.g. to correlate a `RATE_LIMITED` error.
	pub fn request_id(&self) -> Option<&str> {
		match self {
			Self::ComponentMount { request_id, .. }
			| Self::ComponentRehydrate { request_id, .. }
			| Self::ComponentUnmount { request_id, .. }
			| Self::CallAction { request_id, .. }
			| Self::PropertyUpdate { request_id, .. }
			| Self::Auth { request_id, .. }
			| Self::FileUploadStart { request_id, .. }
			| Self::FileUploadComplete { request_id, .. }
			| Self::RoomJoin { request_id, .. } => request_id.as_deref(),
			Self::ComponentPing { .. }
			| Self::FileUploadChunk { .. }
			| Self::RoomLeave { .. }
			| Self::RoomEmit { .. }
			| Self::RoomStateSet { .. } => None,
		}
	}
}
