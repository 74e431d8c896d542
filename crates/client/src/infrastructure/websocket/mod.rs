//! WebSocket client for the game server
//!
//! - `core`: pending-callback table and acknowledgment policy
//! - `decoder`: inbound envelope decoding
//! - `poll`: long-poll cycle bookkeeping
//! - `session`: per-connection protocol state, no I/O
//! - `client`: tokio-tungstenite transport around a session

pub mod client;
mod core;
pub mod decoder;
pub mod poll;
pub mod session;

pub use client::{ApiClient, ClientHandlers};
pub use self::core::{AckPolicy, PendingCallback, PendingCommands};
pub use decoder::{decode_command_result, decode_response, parse_response, ParsedResponse};
pub use poll::{PollDriver, PollPhase};
pub use session::{ProtocolSession, SessionEffect};
