use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("connection registry is at capacity ({0})")]
	AtCapacity(usize),
	#[error("no connection with id {0}")]
	NotFound(live_common::ConnectionId),
	#[error("no pool named {0:?}")]
	UnknownPool(String),
	#[error("connection is not writable and queueIfOffline was false")]
	NotWritable,
	#[error("offline queue is full and no lower-priority entry could be evicted")]
	QueueFull,
	#[error("transport error: {0}")]
	Transport(String),
}
