//! Per-connection governor-style token bucket. One bucket is created per connection at upgrade
//! time and consumed once per inbound message before dispatch.

use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

pub const BUCKET_CAPACITY: u32 = 100;
pub const REFILL_PER_SECOND: u32 = 50;

pub type ConnectionRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub fn new_connection_limiter() -> ConnectionRateLimiter {
	let quota = Quota::per_second(NonZeroU32::new(REFILL_PER_SECOND).expect("nonzero"))
		.allow_burst(NonZeroU32::new(BUCKET_CAPACITY).expect("nonzero"));
	RateLimiter::direct(quota)
}
