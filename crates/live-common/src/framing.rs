//! Binary chunk framing for `FILE_UPLOAD_CHUNK`.
//!
//! `[u32 LE header_len][header_len bytes of JSON header][raw chunk bytes]`.
//! A sibling of `replicate_common::Framed`, but for a single self-contained frame
//! rather than a length-delimited stream, since upload chunks ride the same
//! WebSocket as every other (JSON) message rather than their own transport.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ids::{ComponentId, UploadId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkHeader {
	#[serde(rename = "type")]
	pub kind: String,
	pub upload_id: UploadId,
	pub chunk_index: u32,
	pub component_id: ComponentId,
	#[serde(default)]
	pub request_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
	#[error("frame shorter than the 4-byte header-length prefix")]
	Truncated,
	#[error("header length prefix ({0}) exceeds remaining frame size ({1})")]
	HeaderOverrun(u32, usize),
	#[error("invalid header JSON: {0}")]
	InvalidHeader(#[from] serde_json::Error),
}

/// Parses a binary WebSocket frame into its header and chunk payload.
pub fn decode_chunk_frame(frame: &[u8]) -> Result<(ChunkHeader, Bytes), FrameError> {
	if frame.len() < 4 {
		return Err(FrameError::Truncated);
	}
	let header_len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
	let rest = &frame[4..];
	if header_len as usize > rest.len() {
		return Err(FrameError::HeaderOverrun(header_len, rest.len()));
	}
	let (header_bytes, payload) = rest.split_at(header_len as usize);
	let header: ChunkHeader = serde_json::from_slice(header_bytes)?;
	Ok((header, Bytes::copy_from_slice(payload)))
}

/// Assembles a binary WebSocket frame from a header and chunk payload.
pub fn encode_chunk_frame(header: &ChunkHeader, payload: &[u8]) -> Vec<u8> {
	let header_bytes = serde_json::to_vec(header).expect("header is always serializable");
	let mut out = Vec::with_capacity(4 + header_bytes.len() + payload.len());
	out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
	out.extend_from_slice(&header_bytes);
	out.extend_from_slice(payload);
	out
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn round_trips_chunk_frame() {
		let header = ChunkHeader {
			kind: "FILE_UPLOAD_CHUNK".into(),
			upload_id: UploadId::random(),
			chunk_index: 2,
			component_id: ComponentId::random(),
			request_id: None,
		};
		let payload = b"some bytes";
		let frame = encode_chunk_frame(&header, payload);
		let (decoded_header, decoded_payload) = decode_chunk_frame(&frame).unwrap();
		assert_eq!(decoded_header.chunk_index, 2);
		assert_eq!(&decoded_payload[..], payload);
	}

	#[test]
	fn rejects_truncated_frame() {
		assert!(matches!(decode_chunk_frame(&[0, 1]), Err(FrameError::Truncated)));
	}

	#[test]
	fn rejects_header_len_overrun() {
		let frame = [255u8, 255, 255, 255];
		assert!(matches!(
			decode_chunk_frame(&frame),
			Err(FrameError::HeaderOverrun(_, _))
		));
	}
}
