//! Room membership, broadcast, shared room state and the server-side room event
//! bus.

mod bus;
mod deliverer;
mod error;
mod manager;
mod room;

pub use bus::{EventBus, Handler};
pub use deliverer::RoomDeliverer;
pub use error::RoomError;
pub use manager::{RoomManager, EMPTY_ROOM_TTL};
pub use room::{Membership, Room, RoomState, MAX_ROOM_STATE_BYTES};
