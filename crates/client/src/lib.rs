//! Client for the ra2yr game server protocol.
//!
//! Commands go out as `Command` envelopes over one WebSocket; the server
//! acknowledges each with a correlation id and queue id, and results come back
//! in batches through a long-poll on that queue. [`ApiClient`] handles the
//! round trip and merges game state results into a [`GameStateModel`].

pub mod application;
pub mod config;
pub mod error;
pub mod infrastructure;

pub use application::{GameStateModel, GameSummary, StateRefresher, StateUpdate};
pub use config::ClientConfig;
pub use error::ClientError;
pub use infrastructure::websocket::{AckPolicy, ApiClient, ClientHandlers, PendingCallback};
pub use infrastructure::{ConnectionNotice, ConnectionState, ConnectionStateObserver};
