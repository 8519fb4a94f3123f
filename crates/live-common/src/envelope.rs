//! The wire shape of a signed state envelope.
//!
//! This crate only owns the *shape*; signing, verification, compression and
//! encryption live in `live-signature`, which depends on this crate for the type.

use serde::{Deserialize, Serialize};

use crate::ids::ComponentId;

/// A component's state, signed so that a client can hold it across a disconnect
/// and have the server trust it again on rehydration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignedStateEnvelope {
	/// The (possibly compressed and/or encrypted) payload.
	pub data: EnvelopeData,
	/// Hex-encoded HMAC-SHA256 signature over the canonical serialization of every
	/// other field.
	pub signature: String,
	/// Milliseconds since the Unix epoch, at signing time.
	pub timestamp: u64,
	pub component_id: ComponentId,
	pub version: u32,
	pub key_id: String,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub compressed: bool,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub encrypted: bool,
	/// Hex-encoded 128-bit single-use nonce.
	pub nonce: String,
}

/// The envelope payload, whose shape depends on the `compressed`/`encrypted` flags.
///
/// Kept as an untagged enum so the wire representation is exactly one of:
/// a plain JSON value, a base64 gzip blob, or an `iv:ciphertext` string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EnvelopeData {
	Plain(serde_json::Value),
	Encoded(String),
}
