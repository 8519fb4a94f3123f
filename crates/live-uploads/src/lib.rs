//! Chunked file uploads: start/chunk/complete protocol, validation and per-user
//! quotas.

mod error;
mod manager;
mod quota;
mod upload;
mod validation;

pub use error::UploadError;
pub use manager::{UploadManager, UploadManagerConfig, DEFAULT_CHUNK_TIMEOUT};
pub use quota::QuotaTracker;
pub use upload::{ActiveUpload, ChunkState};
pub use validation::{mime_allowed, validate_filename, validate_magic_bytes, MAX_DECLARED_SIZE};

pub(crate) fn now_ms() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}
