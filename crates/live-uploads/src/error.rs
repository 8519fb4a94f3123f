use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
	#[error("declared size {0} exceeds the 50 MiB per-upload limit")]
	DeclaredSizeTooLarge(u64),
	#[error("user's running 24h upload total would exceed the 500 MiB quota")]
	QuotaExceeded,
	#[error("MIME type {0:?} is not in the allowlist")]
	MimeNotAllowed(String),
	#[error("filename {0:?} has a blocked extension")]
	BlockedExtension(String),
	#[error("filename {0:?} exceeds 255 characters")]
	FilenameTooLong(String),
	#[error("upload id {0} already in progress")]
	DuplicateUploadId(live_common::UploadId),
	#[error("no upload with id {0}")]
	NotFound(live_common::UploadId),
	#[error("chunk index {index} out of bounds (total chunks {total})")]
	ChunkIndexOutOfBounds { index: u32, total: u32 },
	#[error("received {received} bytes but declared size was {declared}")]
	SizeMismatch { received: u64, declared: u64 },
	#[error("file content does not match claimed type {0:?}")]
	MagicByteMismatch(String),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("invalid base64 chunk payload: {0}")]
	Base64(#[from] base64::DecodeError),
}
