//! Compression and authenticated encryption helpers for envelope payloads
//!.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::SignatureError;

/// Fixed salt for the scrypt KDF. A fixed salt is acceptable here (per 
/// step 2) because the input key material already has full entropy from the HMAC
/// signing key; the KDF exists to size/separate the derived encryption key, not to
/// stretch a weak passphrase.
const SCRYPT_SALT: &[u8] = b"live-components/envelope-encryption/v1";

pub fn gzip(data: &[u8], level: u32) -> Result<Vec<u8>, SignatureError> {
	let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
	encoder.write_all(data)?;
	Ok(encoder.finish()?)
}

pub fn gunzip(data: &[u8]) -> Result<Vec<u8>, SignatureError> {
	let mut decoder = GzDecoder::new(data);
	let mut out = Vec::new();
	decoder.read_to_end(&mut out).map_err(|_| SignatureError::Decompress)?;
	Ok(out)
}

pub fn base64_encode(data: &[u8]) -> String {
	base64::Engine::encode(&base64::engine::general_purpose::STANDARD, data)
}

pub fn base64_decode(encoded: &str) -> Result<Vec<u8>, SignatureError> {
	base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
		.map_err(|_| SignatureError::Decompress)
}

pub fn gzip_base64(data: &[u8], level: u32) -> Result<String, SignatureError> {
	Ok(base64_encode(&gzip(data, level)?))
}

pub fn gunzip_base64(encoded: &str) -> Result<Vec<u8>, SignatureError> {
	gunzip(&base64_decode(encoded)?)
}

fn derive_encryption_key(signing_key: &[u8]) -> [u8; 32] {
	let mut derived = [0u8; 32];
	// log_n=14, r=8, p=1: scrypt's own conservative interactive-use defaults.
	let params = scrypt::Params::new(14, 8, 1, 32).expect("fixed params are always valid");
	scrypt::scrypt(signing_key, SCRYPT_SALT, &params, &mut derived)
		.expect("output length matches requested derived key length");
	derived
}

/// Encrypts `plaintext` under a key derived from `signing_key`, returning `"iv:ciphertext"`
/// with both halves hex-encoded, the wire format for encrypted payloads.
pub fn encrypt(signing_key: &[u8], plaintext: &[u8]) -> Result<String, SignatureError> {
	let derived = derive_encryption_key(signing_key);
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived));
	let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
	let ciphertext = cipher
		.encrypt(&nonce, plaintext)
		.map_err(|_| SignatureError::Encrypt)?;
	Ok(format!("{}:{}", hex::encode(nonce), hex::encode(ciphertext)))
}

/// Decrypts an `"iv:ciphertext"` string under a key derived from `signing_key`.
pub fn decrypt(signing_key: &[u8], encoded: &str) -> Result<Vec<u8>, SignatureError> {
	let (iv_hex, ciphertext_hex) = encoded.split_once(':').ok_or(SignatureError::Decrypt)?;
	let iv = hex::decode(iv_hex).map_err(|_| SignatureError::Decrypt)?;
	let ciphertext = hex::decode(ciphertext_hex).map_err(|_| SignatureError::Decrypt)?;
	let derived = derive_encryption_key(signing_key);
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived));
	let nonce = Nonce::from_slice(&iv);
	cipher
		.decrypt(nonce, ciphertext.as_ref())
		.map_err(|_| SignatureError::Decrypt)
}
