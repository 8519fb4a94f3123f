//! Shared types for the live components runtime: ids, wire messages, and the binary
//! chunk framing used by the WebSocket dispatcher.

pub mod envelope;
pub mod framing;
pub mod ids;
pub mod messages;
pub mod room_id;

pub use envelope::{EnvelopeData, SignedStateEnvelope};
pub use ids::{ComponentId, ConnectionId, UploadId, UserId};
pub use messages::{ClientMessage, ServerMessage};
pub use room_id::RoomId;
