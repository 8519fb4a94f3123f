use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomError {
	#[error("no room {0:?}/{1}")]
	NotFound(String, String),
	#[error("room state would exceed the 10 MiB ceiling ({0} bytes)")]
	StateTooLarge(usize),
	#[error("failed to serialize room state: {0}")]
	Serialize(#[from] serde_json::Error),
}
