//! Room identifiers.
//!
//! Room ids are user-chosen strings, not generated uuids, so they need explicit
//! validation instead of just parsing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum length of a room id, in bytes.
pub const MAX_ROOM_ID_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum RoomIdError {
	#[error("room id must be 1-{MAX_ROOM_ID_LEN} chars of [A-Za-z0-9_:.-], got {0:?}")]
	Invalid(String),
}

/// A validated room id, matching `[A-Za-z0-9_:.\-]{1,64}`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
	pub fn new(s: impl Into<String>) -> Result<Self, RoomIdError> {
		let s = s.into();
		if s.is_empty()
			|| s.len() > MAX_ROOM_ID_LEN
			|| !s
				.bytes()
				.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b':' | b'.' | b'-'))
		{
			return Err(RoomIdError::Invalid(s));
		}
		Ok(Self(s))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl TryFrom<String> for RoomId {
	type Error = RoomIdError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl From<RoomId> for String {
	fn from(value: RoomId) -> Self {
		value.0
	}
}

impl fmt::Display for RoomId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn accepts_boundary_length() {
		let sixty_four = "a".repeat(64);
		assert!(RoomId::new(sixty_four).is_ok());
	}

	#[test]
	fn rejects_over_boundary_length() {
		let sixty_five = "a".repeat(65);
		assert!(RoomId::new(sixty_five).is_err());
	}

	#[test]
	fn rejects_invalid_chars() {
		assert!(RoomId::new("chat/7").is_err());
		assert!(RoomId::new("chat 7").is_err());
	}

	#[test]
	fn accepts_allowed_punctuation() {
		assert!(RoomId::new("chat:7_room.a-b").is_ok());
	}
}
