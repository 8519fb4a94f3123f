//! Upload Manager: start/chunk/complete protocol, validation, quotas
//! and the stale-upload cleanup sweep. Upload state lives in a `DashMap`, the
//! concurrency primitive of choice for shared singleton maps elsewhere in this
//! runtime; disk writes go through `tokio::fs` to keep completion off the
//! executor's threads.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use live_common::{ComponentId, UploadId, UserId};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::UploadError;
use crate::quota::QuotaTracker;
use crate::upload::ActiveUpload;
use crate::validation::{self, MAX_DECLARED_SIZE};

/// Timeouts: per-chunk timeout default.
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(30);
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct UploadManagerConfig {
	pub upload_dir: PathBuf,
	pub chunk_timeout: Duration,
}

impl Default for UploadManagerConfig {
	fn default() -> Self {
		Self {
			upload_dir: PathBuf::from("./uploads"),
			chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
		}
	}
}

pub struct UploadManager {
	uploads: DashMap<UploadId, Arc<ActiveUpload>>,
	quota: QuotaTracker,
	config: UploadManagerConfig,
}

impl UploadManager {
	pub fn new(config: UploadManagerConfig) -> Self {
		Self {
			uploads: DashMap::new(),
			quota: QuotaTracker::new(),
			config,
		}
	}

	/// Limits & validation (at start).
	#[instrument(skip(self))]
	pub fn start(
		&self,
		upload_id: UploadId,
		owning_component_id: ComponentId,
		user_id: Option<UserId>,
		filename: String,
		mime_type: String,
		declared_size: u64,
		total_chunks: u32,
		now_ms: u64,
	) -> Result<(), UploadError> {
		if self.uploads.contains_key(&upload_id) {
			return Err(UploadError::DuplicateUploadId(upload_id));
		}
		if declared_size > MAX_DECLARED_SIZE {
			return Err(UploadError::DeclaredSizeTooLarge(declared_size));
		}
		if !validation::mime_allowed(&mime_type) {
			return Err(UploadError::MimeNotAllowed(mime_type));
		}
		validation::validate_filename(&filename)?;

		if let Some(user_id) = user_id {
			if !self.quota.try_reserve(user_id, declared_size, now_ms / 1000) {
				return Err(UploadError::QuotaExceeded);
			}
		}

		let upload = Arc::new(ActiveUpload::new(
			upload_id,
			owning_component_id,
			user_id,
			filename,
			mime_type,
			declared_size,
			total_chunks,
			now_ms,
		));
		self.uploads.insert(upload_id, upload);
		debug!(upload = %upload_id, "started upload");
		Ok(())
	}

	/// During upload: bounds-checked, idempotent per index.
	pub async fn chunk(
		&self,
		upload_id: UploadId,
		index: u32,
		bytes: Vec<u8>,
		now_ms: u64,
	) -> Result<(), UploadError> {
		let upload = self
			.uploads
			.get(&upload_id)
			.map(|e| Arc::clone(&e))
			.ok_or(UploadError::NotFound(upload_id))?;
		if index >= upload.total_chunks {
			return Err(UploadError::ChunkIndexOutOfBounds {
				index,
				total: upload.total_chunks,
			});
		}

		let mut state = upload.chunks.lock().await;
		if state.received.contains_key(&index) {
			return Ok(());
		}
		state.bytes_received += bytes.len() as u64;
		state.received.insert(index, bytes);
		state.last_chunk_at_ms = now_ms;
		Ok(())
	}

	/// At complete: size check, magic-byte validation, assembly, write,
	/// resolved URL. Releases the quota reservation on failure so it doesn't count
	/// against the user permanently.
	pub async fn complete(&self, upload_id: UploadId) -> Result<String, UploadError> {
		let upload = self
			.uploads
			.get(&upload_id)
			.map(|e| Arc::clone(&e))
			.ok_or(UploadError::NotFound(upload_id))?;

		let assembled = {
			let state = upload.chunks.lock().await;
			if state.bytes_received != upload.declared_size {
				return Err(UploadError::SizeMismatch {
					received: state.bytes_received,
					declared: upload.declared_size,
				});
			}

			let first_chunk = state.received.get(&0).map(|c| c.as_slice()).unwrap_or(&[]);
			if let Err(err) = validation::validate_magic_bytes(&upload.mime_type, first_chunk) {
				if let Some(user_id) = upload.user_id {
					self.quota.release(user_id, upload.declared_size);
				}
				return Err(err);
			}

			let mut assembled = Vec::with_capacity(upload.declared_size as usize);
			for index in 0..upload.total_chunks {
				let chunk = state
					.received
					.get(&index)
					.ok_or(UploadError::ChunkIndexOutOfBounds {
						index,
						total: upload.total_chunks,
					})?;
				assembled.extend_from_slice(chunk);
			}
			assembled
		};

		let ext = validation::extension_of(&upload.filename).unwrap_or_default();
		let stored_name = if ext.is_empty() {
			Uuid::new_v4().to_string()
		} else {
			format!("{}.{}", Uuid::new_v4(), ext)
		};
		let path = self.config.upload_dir.join(&stored_name);
		self.write_file(&path, &assembled).await?;

		self.uploads.remove(&upload_id);
		info!(upload = %upload_id, file = %stored_name, "completed upload");
		Ok(format!("/uploads/{stored_name}"))
	}

	async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), UploadError> {
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		tokio::fs::write(path, bytes).await?;
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.uploads.len()
	}

	pub fn is_empty(&self) -> bool {
		self.uploads.is_empty()
	}

	/// Timeouts: drops uploads with no chunk activity for twice the
	/// per-chunk timeout.
	pub fn spawn_cleanup_sweep(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
		let manager = Arc::clone(self);
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
			let stale_after_ms = manager.config.chunk_timeout.as_millis() as u64 * 2;
			loop {
				ticker.tick().await;
				let now_ms = crate::now_ms();
				let mut stale = Vec::new();
				for entry in manager.uploads.iter() {
					let last_activity = entry.value().chunks.lock().await.last_chunk_at_ms;
					if now_ms.saturating_sub(last_activity) > stale_after_ms {
						stale.push(*entry.key());
					}
				}
				for upload_id in stale {
					if let Some((_, upload)) = manager.uploads.remove(&upload_id) {
						if let Some(user_id) = upload.user_id {
							manager.quota.release(user_id, upload.declared_size);
						}
					}
					warn!(upload = %upload_id, "dropped stale upload");
				}
			}
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use tempfile::TempDir;

	fn manager_with_dir(dir: &TempDir) -> UploadManager {
		UploadManager::new(UploadManagerConfig {
			upload_dir: dir.path().to_path_buf(),
			chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
		})
	}

	#[tokio::test]
	async fn full_upload_round_trip_succeeds() {
		let tmp = TempDir::new();
		let mgr = manager_with_dir(&tmp);
		let upload_id = UploadId::random();
		let component = ComponentId::random();
		let jpeg_bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];

		mgr.start(
			upload_id,
			component,
			None,
			"photo.jpg".to_string(),
			"image/jpeg".to_string(),
			jpeg_bytes.len() as u64,
			1,
			0,
		)
		.unwrap();

		mgr.chunk(upload_id, 0, jpeg_bytes.clone(), 0).await.unwrap();
		let url = mgr.complete(upload_id).await.unwrap();
		assert!(url.starts_with("/uploads/"));
		assert!(url.ends_with(".jpg"));
	}

	#[tokio::test]
	async fn duplicate_chunk_index_is_idempotent() {
		let tmp = TempDir::new();
		let mgr = manager_with_dir(&tmp);
		let upload_id = UploadId::random();
		mgr.start(
			upload_id,
			ComponentId::random(),
			None,
			"a.txt".to_string(),
			"text/plain".to_string(),
			4,
			1,
			0,
		)
		.unwrap();
		mgr.chunk(upload_id, 0, vec![1, 2, 3, 4], 0).await.unwrap();
		mgr.chunk(upload_id, 0, vec![9, 9, 9, 9], 0).await.unwrap();
		let url = mgr.complete(upload_id).await.unwrap();
		assert!(url.starts_with("/uploads/"));
	}

	#[tokio::test]
	async fn declared_size_over_limit_rejected() {
		let tmp = TempDir::new();
		let mgr = manager_with_dir(&tmp);
		let err = mgr
			.start(
				UploadId::random(),
				ComponentId::random(),
				None,
				"big.zip".to_string(),
				"application/zip".to_string(),
				MAX_DECLARED_SIZE + 1,
				1,
				0,
			)
			.unwrap_err();
		assert!(matches!(err, UploadError::DeclaredSizeTooLarge(_)));
	}

	#[tokio::test]
	async fn wrong_magic_bytes_rejected_at_complete() {
		let tmp = TempDir::new();
		let mgr = manager_with_dir(&tmp);
		let upload_id = UploadId::random();
		mgr.start(
			upload_id,
			ComponentId::random(),
			None,
			"photo.jpg".to_string(),
			"image/jpeg".to_string(),
			3,
			1,
			0,
		)
		.unwrap();
		mgr.chunk(upload_id, 0, vec![0x00, 0x00, 0x00], 0).await.unwrap();
		let err = mgr.complete(upload_id).await.unwrap_err();
		assert!(matches!(err, UploadError::MagicByteMismatch(_)));
	}

	#[tokio::test]
	async fn duplicate_upload_id_rejected() {
		let tmp = TempDir::new();
		let mgr = manager_with_dir(&tmp);
		let upload_id = UploadId::random();
		mgr.start(
			upload_id,
			ComponentId::random(),
			None,
			"a.txt".to_string(),
			"text/plain".to_string(),
			1,
			1,
			0,
		)
		.unwrap();
		let err = mgr
			.start(
				upload_id,
				ComponentId::random(),
				None,
				"b.txt".to_string(),
				"text/plain".to_string(),
				1,
				1,
				0,
			)
			.unwrap_err();
		assert!(matches!(err, UploadError::DuplicateUploadId(_)));
	}
}
