//! Start-time and completion-time validation. The magic-byte table is a small
//! hand-rolled matcher rather than a crate dependency like `infer`, since a
//! problem this bounded doesn't need one.

use crate::error::UploadError;

pub const MAX_DECLARED_SIZE: u64 = 50 * 1024 * 1024;
pub const MAX_USER_QUOTA_PER_WINDOW: u64 = 500 * 1024 * 1024;
pub const QUOTA_WINDOW_SECS: u64 = 24 * 60 * 60;
pub const MAX_FILENAME_LEN: usize = 255;

const ALLOWED_MIME_TYPES: &[&str] = &[
	"image/jpeg",
	"image/png",
	"image/gif",
	"image/webp",
	"application/pdf",
	"text/plain",
	"text/csv",
	"application/json",
	"application/zip",
	"application/gzip",
	"application/x-gzip",
];

const BLOCKED_EXTENSIONS: &[&str] = &[
	"exe", "dll", "so", "dylib", "bat", "cmd", "sh", "ps1", "com", "scr", "msi", "jar", "app",
];

pub fn mime_allowed(mime: &str) -> bool {
	ALLOWED_MIME_TYPES.contains(&mime)
}

/// Rejects any filename whose basename has a blocked extension, including a
/// blocked *intermediate* extension in a double-extension name like `a.exe.jpg`
///.
pub fn validate_filename(filename: &str) -> Result<(), UploadError> {
	if filename.len() > MAX_FILENAME_LEN {
		return Err(UploadError::FilenameTooLong(filename.to_string()));
	}
	let basename = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
	let parts: Vec<&str> = basename.split('.').collect();
	if parts.len() > 1 {
		for ext in &parts[1..] {
			if BLOCKED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
				return Err(UploadError::BlockedExtension(filename.to_string()));
			}
		}
	}
	Ok(())
}

pub fn extension_of(filename: &str) -> Option<String> {
	let basename = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
	basename.rsplit_once('.').map(|(_, ext)| ext.to_string())
}

/// At complete: magic-byte validation against the claimed MIME type.
/// Text-like types are skipped entirely (no fixed byte signature).
pub fn validate_magic_bytes(mime: &str, first_chunk: &[u8]) -> Result<(), UploadError> {
	let matches = match mime {
		"image/jpeg" => first_chunk.starts_with(&[0xFF, 0xD8, 0xFF]),
		"image/png" => first_chunk.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
		"image/gif" => {
			first_chunk.starts_with(b"GIF87a") || first_chunk.starts_with(b"GIF89a")
		}
		"image/webp" => {
			first_chunk.len() >= 12
				&& first_chunk.starts_with(b"RIFF")
				&& &first_chunk[8..12] == b"WEBP"
		}
		"application/pdf" => first_chunk.starts_with(b"%PDF"),
		"application/zip" => first_chunk.starts_with(&[0x50, 0x4B, 0x03, 0x04]),
		"application/gzip" | "application/x-gzip" => first_chunk.starts_with(&[0x1F, 0x8B]),
		"text/plain" | "text/csv" | "application/json" => return Ok(()),
		_ => return Ok(()),
	};
	if matches {
		Ok(())
	} else {
		Err(UploadError::MagicByteMismatch(mime.to_string()))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn blocks_double_extension_disguise() {
		assert!(validate_filename("a.exe.jpg").is_err());
	}

	#[test]
	fn allows_plain_image() {
		assert!(validate_filename("photo.jpg").is_ok());
	}

	#[test]
	fn jpeg_magic_bytes_accepted() {
		assert!(validate_magic_bytes("image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0]).is_ok());
	}

	#[test]
	fn jpeg_magic_bytes_rejected_for_wrong_header() {
		assert!(validate_magic_bytes("image/jpeg", &[0x00, 0x00, 0x00]).is_err());
	}

	#[test]
	fn text_types_skip_magic_check() {
		assert!(validate_magic_bytes("text/plain", &[0x00, 0x01]).is_ok());
	}

	#[test]
	fn mime_allowlist_rejects_unknown() {
		assert!(!mime_allowed("application/x-msdownload"));
	}
}
