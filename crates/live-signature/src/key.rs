//! Signing keys and key rotation.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Label HMAC'd under a key to deterministically derive that key's id.
const KEY_ID_LABEL: &[u8] = b"live-components/key-id/v1";

/// Number of hex chars to keep from the key-id HMAC.
const KEY_ID_LEN: usize = 16;

#[derive(Clone)]
pub struct SigningKey {
	pub id: String,
	pub bytes: [u8; 32],
	pub created_at: u64,
}

impl std::fmt::Debug for SigningKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SigningKey")
			.field("id", &self.id)
			.field("created_at", &self.created_at)
			.finish_non_exhaustive()
	}
}

impl SigningKey {
	pub fn generate() -> Self {
		let mut bytes = [0u8; 32];
		rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
		Self::from_bytes(bytes)
	}

	pub fn from_bytes(bytes: [u8; 32]) -> Self {
		let id = derive_key_id(&bytes);
		let created_at = now_ms();
		Self { id, bytes, created_at }
	}

	/// Builds a fixed key from a secret, e.g. `STATE_SECRET` from the environment.
	/// Useful for deployments that want a stable key instead of an ephemeral one.
	pub fn from_secret(secret: &[u8]) -> Self {
		let mut mac =
			HmacSha256::new_from_slice(secret).expect("HMAC accepts a key of any length");
		mac.update(b"live-components/seed/v1");
		let digest = mac.finalize().into_bytes();
		let mut bytes = [0u8; 32];
		bytes.copy_from_slice(&digest);
		Self::from_bytes(bytes)
	}

	pub fn hmac(&self) -> HmacSha256 {
		HmacSha256::new_from_slice(&self.bytes).expect("32-byte key is always valid")
	}
}

fn derive_key_id(key_bytes: &[u8; 32]) -> String {
	let mut mac = HmacSha256::new_from_slice(key_bytes).expect("32-byte key is always valid");
	mac.update(KEY_ID_LABEL);
	let digest = mac.finalize().into_bytes();
	hex::encode(digest)[..KEY_ID_LEN].to_string()
}

pub fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}
