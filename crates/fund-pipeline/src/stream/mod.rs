//! Streaming session client
//!
//! - [`session`]: the per-invocation state machine and ordered event log
//! - [`transport`]: the socket seam and its WebSocket implementation
//! - [`client`]: opens sessions and turns inbound frames into updates

pub mod client;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{SessionUpdate, StreamHandle, StreamingClient};
pub use session::{FrameOutcome, SessionId, SessionState, StreamSession};
pub use transport::{Connector, Transport, WsConnector};
