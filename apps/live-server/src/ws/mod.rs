//! The WebSocket dispatcher: a single `/api/live/ws` upgrade handler
//! multiplexing one connection's inbound messages across every subsystem crate.

mod dispatcher;
pub mod transport;

pub use dispatcher::routes;
