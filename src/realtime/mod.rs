//! Real-time synchronization over WebSocket
//!
//! Clients subscribe to channels (`student:<id>`, `admins`) and receive
//! lifecycle updates pushed by the server. There is no replay: a client that
//! reconnects re-issues its list query, or falls back to the HTTP endpoints
//! when no reply arrives within its own timeout (3 s in the shipped clients).

pub mod events;
pub mod handlers;
pub mod hub;
pub mod relay;
pub mod socket;

pub use events::{ClientEvent, ServerEvent};
pub use hub::{Channel, ConnectionId, RealtimeHub};
