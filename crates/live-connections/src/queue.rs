//! Bounded, priority-ordered offline message queue.
//! Single-writer (the connection task), single-reader (the sender on drain) — one
//! mutex guards the whole thing, never held across an `.await`.

use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::Mutex;

pub const DEFAULT_MAX_QUEUE_LEN: usize = 1_000;
pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Priority {
	Low = 0,
	#[default]
	Normal = 1,
	High = 2,
}

#[derive(Debug, Clone)]
pub struct QueuedMessage {
	pub payload: Bytes,
	pub priority: Priority,
	pub retries: u32,
	/// Monotonic sequence number used to order entries of equal priority and to
	/// decide which one is "older" when evicting.
	pub seq: u64,
}

#[derive(Debug)]
pub struct OfflineQueue {
	inner: Mutex<Inner>,
	max_len: usize,
	max_retries: u32,
}

#[derive(Debug, Default)]
struct Inner {
	entries: VecDeque<QueuedMessage>,
	next_seq: u64,
}

impl OfflineQueue {
	pub fn new(max_len: usize, max_retries: u32) -> Self {
		Self {
			inner: Mutex::new(Inner::default()),
			max_len,
			max_retries,
		}
	}

	pub fn len(&self) -> usize {
		self.inner.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Inserts in priority order (highest priority first, FIFO within a priority).
	/// On overflow, evicts the lowest-priority entry older than the new one; if no
	/// such victim exists (every entry outranks the new one), the insert is refused.
	pub fn enqueue(&self, payload: Bytes, priority: Priority) -> Result<(), crate::ConnectionError> {
		let mut inner = self.inner.lock();
		if inner.entries.len() >= self.max_len {
			let lowest = inner.entries.iter().map(|e| e.priority).min();
			match lowest {
				Some(lowest) if lowest <= priority => {
					let victim = inner
						.entries
						.iter()
						.enumerate()
						.filter(|(_, e)| e.priority == lowest)
						.min_by_key(|(_, e)| e.seq)
						.map(|(idx, _)| idx)
						.expect("lowest priority must have at least one entry");
					inner.entries.remove(victim);
				}
				_ => return Err(crate::ConnectionError::QueueFull),
			}
		}

		let seq = inner.next_seq;
		inner.next_seq += 1;
		let entry = QueuedMessage {
			payload,
			priority,
			retries: 0,
			seq,
		};
		let pos = inner
			.entries
			.iter()
			.position(|e| e.priority < entry.priority)
			.unwrap_or(inner.entries.len());
		inner.entries.insert(pos, entry);
		Ok(())
	}

	/// Removes and returns every entry, in priority/FIFO order, for the caller to
	/// send outside the lock (sends are async; this mutex is not held across one).
	pub fn drain_collect(&self) -> Vec<QueuedMessage> {
		let mut inner = self.inner.lock();
		std::mem::take(&mut inner.entries).into_iter().collect()
	}

	/// Re-inserts entries that failed to send, preserving their relative order at
	/// the front of the queue ahead of anything enqueued in the meantime.
	pub fn requeue_front_many(&self, entries: Vec<QueuedMessage>) {
		if entries.is_empty() {
			return;
		}
		let mut inner = self.inner.lock();
		for entry in entries.into_iter().rev() {
			inner.entries.push_front(entry);
		}
	}

	pub fn max_retries(&self) -> u32 {
		self.max_retries
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn msg(n: u8) -> Bytes {
		Bytes::from(vec![n])
	}

	#[test]
	fn inserts_in_priority_order() {
		let q = OfflineQueue::new(10, 3);
		q.enqueue(msg(1), Priority::Normal).unwrap();
		q.enqueue(msg(2), Priority::High).unwrap();
		q.enqueue(msg(3), Priority::Low).unwrap();
		let drained = q.drain_collect();
		assert_eq!(
			drained.iter().map(|e| e.priority).collect::<Vec<_>>(),
			vec![Priority::High, Priority::Normal, Priority::Low]
		);
	}

	#[test]
	fn overflow_evicts_lowest_priority_oldest_entry() {
		let q = OfflineQueue::new(2, 3);
		q.enqueue(msg(1), Priority::Low).unwrap();
		q.enqueue(msg(2), Priority::Low).unwrap();
		q.enqueue(msg(3), Priority::Normal).unwrap();
		let drained = q.drain_collect();
		assert_eq!(drained.len(), 2);
		assert_eq!(drained[0].priority, Priority::Normal);
		assert_eq!(drained[1].payload, msg(2));
	}

	#[test]
	fn overflow_refuses_when_everything_outranks_new_entry() {
		let q = OfflineQueue::new(1, 3);
		q.enqueue(msg(1), Priority::High).unwrap();
		let err = q.enqueue(msg(2), Priority::Low).unwrap_err();
		assert!(matches!(err, crate::ConnectionError::QueueFull));
	}
}
