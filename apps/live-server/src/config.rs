//! Runtime configuration: CLI flags with `env` fallbacks for every
//! configurable knob this runtime exposes, in the shape of `identity_server::Cli`.

use std::net::IpAddr;
use std::time::Duration;

#[cfg(test)]
use clap::Parser as _;
use live_signature::SignatureConfig;

#[derive(clap::Parser, Debug, Clone)]
pub struct Config {
	#[clap(long, short, env, default_value = "0")]
	pub port: u16,

	#[clap(long, env, default_value = "::")]
	pub bind: IpAddr,

	/// Seeds the state signer's initial signing key. When
	/// unset a fresh random key is generated at startup, which invalidates any
	/// state signed by a previous process on restart.
	#[clap(long, env)]
	pub state_secret: Option<String>,

	#[clap(long, env = "KEY_ROTATION_INTERVAL", default_value = "86400000")]
	pub key_rotation_interval_ms: u64,

	#[clap(long, env = "MAX_KEY_AGE", default_value = "604800000")]
	pub max_key_age_ms: u64,

	#[clap(long, env, default_value = "10")]
	pub key_retention_count: usize,

	#[clap(long, env, default_value = "true")]
	pub compression_enabled: bool,

	#[clap(long, env, default_value = "1024")]
	pub compression_threshold: usize,

	#[clap(long, env, default_value = "6")]
	pub compression_level: u32,

	/// Enables the `/api/live/debug/*` channel.
	#[clap(long, env, default_value = "false")]
	pub debug_live: bool,

	/// `true`, `false`, or a csv over `{lifecycle, messages, state, performance,
	/// rooms, websocket}`.
	#[clap(long, env, default_value = "false")]
	pub live_logging: String,
}

impl Config {
	pub fn key_rotation_interval(&self) -> Duration {
		Duration::from_millis(self.key_rotation_interval_ms)
	}

	pub fn max_key_age(&self) -> Duration {
		Duration::from_millis(self.max_key_age_ms)
	}

	pub fn signature_config(&self) -> SignatureConfig {
		SignatureConfig {
			compression_enabled: self.compression_enabled,
			compression_threshold: self.compression_threshold,
			compression_level: self.compression_level,
			key_rotation_interval: self.key_rotation_interval(),
			max_key_age: self.max_key_age(),
			key_retention_count: self.key_retention_count,
			..Default::default()
		}
	}

	pub fn signing_key(&self) -> live_signature::SigningKey {
		match &self.state_secret {
			Some(secret) => live_signature::SigningKey::from_secret(secret.as_bytes()),
			None => live_signature::SigningKey::generate(),
		}
	}

	/// Parses `LIVE_LOGGING` into the set of categories that should log at
	/// console verbosity.
	pub fn live_logging(&self) -> LiveLogging {
		LiveLogging::parse(&self.live_logging)
	}
}

/// The recognized categories are `lifecycle, messages, state, performance,
/// rooms, websocket`. `LIVE_LOGGING` is either `true` (all of them), `false`
/// (none), or a csv naming a subset.
#[derive(Debug, Clone)]
pub enum LiveLogging {
	All,
	None,
	Categories(std::collections::HashSet<String>),
}

impl LiveLogging {
	fn parse(raw: &str) -> Self {
		match raw.trim() {
			"true" => Self::All,
			"false" | "" => Self::None,
			csv => Self::Categories(csv.split(',').map(|s| s.trim().to_lowercase()).collect()),
		}
	}

	pub fn is_enabled(&self, category: &str) -> bool {
		match self {
			Self::All => true,
			Self::None => false,
			Self::Categories(set) => set.contains(category),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn parses_with_only_required_defaults() {
		let cfg = Config::parse_from(["live-server"]);
		assert_eq!(cfg.port, 0);
		assert!(cfg.compression_enabled);
		assert_eq!(cfg.live_logging, "false");
	}

	#[test]
	fn state_secret_yields_deterministic_key() {
		let mut cfg = Config::parse_from(["live-server"]);
		cfg.state_secret = Some("shared-secret".to_string());
		let a = cfg.signing_key();
		let b = cfg.signing_key();
		assert_eq!(a.id, b.id);
	}
}
