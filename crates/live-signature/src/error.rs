//! Hard errors for the signature engine, kept separate from [`crate::ValidationOutcome`],
//! the *soft*, expected tagged result returned by `validate`.

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
	#[error("failed to serialize state")]
	Serialize(#[from] serde_json::Error),
	#[error("failed to compress state")]
	Compress(#[from] std::io::Error),
	#[error("failed to decompress state")]
	Decompress,
	#[error("failed to encrypt state")]
	Encrypt,
	#[error("failed to decrypt state")]
	Decrypt,
	#[error("no migration registered for {from}->{to}")]
	NoMigration { from: u32, to: u32 },
	#[error("migration {from}->{to} failed: {reason}")]
	MigrationFailed { from: u32, to: u32, reason: String },
}
