//! Active upload state.

use std::collections::HashMap;

use live_common::{ComponentId, UploadId, UserId};
use tokio::sync::Mutex;

pub struct ActiveUpload {
	pub id: UploadId,
	pub owning_component_id: ComponentId,
	pub user_id: Option<UserId>,
	pub filename: String,
	pub mime_type: String,
	pub declared_size: u64,
	pub total_chunks: u32,
	pub started_at_ms: u64,
	pub chunks: Mutex<ChunkState>,
}

#[derive(Default)]
pub struct ChunkState {
	pub received: HashMap<u32, Vec<u8>>,
	pub bytes_received: u64,
	pub last_chunk_at_ms: u64,
}

impl ActiveUpload {
	pub fn new(
		id: UploadId,
		owning_component_id: ComponentId,
		user_id: Option<UserId>,
		filename: String,
		mime_type: String,
		declared_size: u64,
		total_chunks: u32,
		now_ms: u64,
	) -> Self {
		Self {
			id,
			owning_component_id,
			user_id,
			filename,
			mime_type,
			declared_size,
			total_chunks,
			started_at_ms: now_ms,
			chunks: Mutex::new(ChunkState {
				last_chunk_at_ms: now_ms,
				..ChunkState::default()
			}),
		}
	}
}
