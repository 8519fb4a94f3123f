//! HMAC-signed, optionally compressed/encrypted state envelopes with anti-replay,
//! key rotation and migration.

mod backup;
mod crypto;
mod engine;
mod error;
mod key;
mod nonce;
mod ring;

pub use backup::{BackupStore, StateBackup};
pub use engine::{SignOptions, SignatureConfig, StateSignatureEngine, ValidationOutcome};
pub use error::SignatureError;
pub use key::SigningKey;
pub use nonce::NonceStore;
pub use ring::KeyRing;
