//! The state signature engine itself: signing, validation, extraction,
//! key rotation and migration, all behind one façade.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hmac::Mac;
use live_common::envelope::EnvelopeData;
use live_common::{ComponentId, SignedStateEnvelope};
use parking_lot::Mutex;
use rand::RngCore;
use serde_json::{Map, Value};
use subtle::ConstantTimeEq;
use tracing::{instrument, warn};

use crate::backup::BackupStore;
use crate::crypto;
use crate::error::SignatureError;
use crate::key::{now_ms, SigningKey};
use crate::nonce::NonceStore;
use crate::ring::KeyRing;

/// Envelopes older than this are rejected regardless of signature validity; it is
/// also the horizon used to bound the nonce replay window.
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct SignatureConfig {
	pub max_age: Duration,
	pub compression_enabled: bool,
	pub compression_threshold: usize,
	pub compression_level: u32,
	pub key_rotation_interval: Duration,
	pub max_key_age: Duration,
	pub key_retention_count: usize,
}

impl Default for SignatureConfig {
	fn default() -> Self {
		Self {
			max_age: DEFAULT_MAX_AGE,
			compression_enabled: true,
			compression_threshold: 1024,
			compression_level: 6,
			key_rotation_interval: Duration::from_secs(24 * 60 * 60),
			max_key_age: Duration::from_secs(7 * 24 * 60 * 60),
			key_retention_count: 10,
		}
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignOptions {
	pub encrypt: bool,
}

/// The tagged result of [`StateSignatureEngine::validate`]. Callers never
/// see raw crypto errors — every failure mode collapses into one of these variants.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ValidationOutcome {
	Valid,
	Expired,
	Tampered,
	Replayed,
	KeyRotated,
	KeyNotFound,
}

type MigrationFn = dyn Fn(Value) -> Result<Value, String> + Send + Sync;

pub struct StateSignatureEngine {
	keys: KeyRing,
	nonces: NonceStore,
	backups: BackupStore,
	migrations: Mutex<HashMap<(u32, u32), Arc<MigrationFn>>>,
	config: SignatureConfig,
}

/// Wire-level wrapper embedding the component's class name inside the signed
/// plaintext, so rehydration can authoritatively detect cross-class tampering.
#[derive(serde::Serialize, serde::Deserialize)]
struct AnnotatedState {
	#[serde(rename = "__componentName")]
	component_name: String,
	state: Value,
}

impl StateSignatureEngine {
	pub fn new(initial_key: SigningKey, config: SignatureConfig) -> Self {
		let keys = KeyRing::new(initial_key, config.max_key_age, config.key_retention_count);
		Self {
			keys,
			nonces: NonceStore::new(config.max_age),
			backups: BackupStore::new(),
			migrations: Mutex::new(HashMap::new()),
			config,
		}
	}

	pub fn config(&self) -> &SignatureConfig {
		&self.config
	}

	pub fn rotate_keys(&self) {
		self.keys.rotate();
	}

	pub fn register_migration(
		&self,
		from_version: u32,
		to_version: u32,
		f: impl Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
	) {
		self.migrations
			.lock()
			.insert((from_version, to_version), Arc::new(f));
	}

	#[instrument(skip(self, data), fields(%component_id, version))]
	pub fn sign(
		&self,
		component_id: ComponentId,
		component_name: &str,
		data: Value,
		version: u32,
		opts: SignOptions,
	) -> Result<SignedStateEnvelope, SignatureError> {
		let annotated = AnnotatedState {
			component_name: component_name.to_string(),
			state: data,
		};
		let serialized = serde_json::to_vec(&annotated)?;

		let mut compressed = false;
		let working_bytes = if self.config.compression_enabled
			&& serialized.len() > self.config.compression_threshold
		{
			compressed = true;
			crypto::gzip(&serialized, self.config.compression_level)?
		} else {
			serialized
		};

		let key = self.keys.current();
		let (data_field, encrypted) = if opts.encrypt {
			let encoded = crypto::encrypt(&key.bytes, &working_bytes)?;
			(EnvelopeData::Encoded(encoded), true)
		} else if compressed {
			(EnvelopeData::Encoded(crypto::base64_encode(&working_bytes)), false)
		} else {
			let value: Value = serde_json::from_slice(&working_bytes)?;
			(EnvelopeData::Plain(value), false)
		};

		let nonce = random_nonce_hex();
		let timestamp = now_ms();

		let mut envelope = SignedStateEnvelope {
			data: data_field,
			signature: String::new(),
			timestamp,
			component_id,
			version,
			key_id: key.id.clone(),
			compressed,
			encrypted,
			nonce,
		};
		envelope.signature = sign_envelope(&key, &envelope)?;

		self.backups.snapshot(component_id, version, annotated.state_value());

		Ok(envelope)
	}

	/// Validates an envelope in order: age, replay, key lookup, signature, then
	/// (unless `read_only`) consume the nonce.
	#[instrument(skip(self, envelope), fields(component_id = %envelope.component_id))]
	pub fn validate(&self, envelope: &SignedStateEnvelope, read_only: bool) -> ValidationOutcome {
		let now = now_ms();
		let age_ms = self.config.max_age.as_millis() as u64;
		if now.saturating_sub(envelope.timestamp) > age_ms {
			return ValidationOutcome::Expired;
		}

		if self.nonces.has_consumed(&envelope.nonce) {
			return ValidationOutcome::Replayed;
		}

		let Some(key) = self.keys.find(&envelope.key_id) else {
			return ValidationOutcome::KeyNotFound;
		};
		let rotated = envelope.key_id != self.keys.current_id();

		let expected = match sign_envelope(&key, envelope) {
			Ok(sig) => sig,
			Err(err) => {
				warn!(?err, "failed to recompute signature during validation");
				return ValidationOutcome::Tampered;
			}
		};

		let actual_bytes = envelope.signature.as_bytes();
		let expected_bytes = expected.as_bytes();
		let matches = actual_bytes.len() == expected_bytes.len()
			&& bool::from(actual_bytes.ct_eq(expected_bytes));
		if !matches {
			return ValidationOutcome::Tampered;
		}

		if !read_only && !self.nonces.consume(&envelope.nonce) {
			// Lost a race with a concurrent validation of the same envelope.
			return ValidationOutcome::Replayed;
		}

		if rotated {
			ValidationOutcome::KeyRotated
		} else {
			ValidationOutcome::Valid
		}
	}

	/// Extracts the plaintext state and embedded component name from an envelope,
	/// decrypting then decompressing then parsing.
	/// Does not itself validate the signature; callers must `validate` first.
	pub fn extract(&self, envelope: &SignedStateEnvelope) -> Result<(String, Value), SignatureError> {
		let raw_bytes: Vec<u8> = match &envelope.data {
			EnvelopeData::Plain(value) => serde_json::to_vec(value)?,
			EnvelopeData::Encoded(encoded) => {
				if envelope.encrypted {
					let key = self
						.keys
						.find(&envelope.key_id)
						.ok_or(SignatureError::Decrypt)?;
					let decrypted = crypto::decrypt(&key.bytes, encoded)?;
					if envelope.compressed {
						crypto::gunzip(&decrypted)?
					} else {
						decrypted
					}
				} else if envelope.compressed {
					crypto::gunzip_base64(encoded)?
				} else {
					return Err(SignatureError::Decompress);
				}
			}
		};
		let annotated: AnnotatedState = serde_json::from_slice(&raw_bytes)?;
		Ok((annotated.component_name, annotated.state))
	}

	/// Rewrites a live component's state in place, moving it from `from_version` to
	/// `to_version` via a registered migration function.
	pub fn migrate(&self, from_version: u32, to_version: u32, data: Value) -> Result<Value, SignatureError> {
		let migration = self
			.migrations
			.lock()
			.get(&(from_version, to_version))
			.cloned()
			.ok_or(SignatureError::NoMigration {
				from: from_version,
				to: to_version,
			})?;
		migration(data).map_err(|reason| SignatureError::MigrationFailed {
			from: from_version,
			to: to_version,
			reason,
		})
	}
}

impl AnnotatedState {
	fn state_value(&self) -> Value {
		self.state.clone()
	}
}

fn random_nonce_hex() -> String {
	let mut bytes = [0u8; 16];
	rand::thread_rng().fill_bytes(&mut bytes);
	hex::encode(bytes)
}

/// Computes the HMAC-SHA256 signature over the canonical (sorted-key) serialization
/// of every envelope field except the signature itself. `serde_json::Map` is backed by a `BTreeMap` in this workspace (the
/// `preserve_order` feature is never enabled), so building the map already yields
/// sorted keys.
fn sign_envelope(key: &SigningKey, envelope: &SignedStateEnvelope) -> Result<String, SignatureError> {
	let mut fields = Map::new();
	fields.insert("data".into(), serde_json::to_value(&envelope.data)?);
	fields.insert("timestamp".into(), envelope.timestamp.into());
	fields.insert(
		"componentId".into(),
		Value::String(envelope.component_id.to_string()),
	);
	fields.insert("version".into(), envelope.version.into());
	fields.insert("keyId".into(), Value::String(envelope.key_id.clone()));
	fields.insert("compressed".into(), envelope.compressed.into());
	fields.insert("encrypted".into(), envelope.encrypted.into());
	fields.insert("nonce".into(), Value::String(envelope.nonce.clone()));

	let canonical = serde_json::to_vec(&Value::Object(fields))?;
	let mut mac = key.hmac();
	mac.update(&canonical);
	Ok(hex::encode(mac.finalize().into_bytes()))
}
