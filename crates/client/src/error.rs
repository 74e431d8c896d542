//! Client error types.

use thiserror::Error;

/// Every failure the client surfaces, either synchronously from a call or
/// through the close-callback channel.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The pending-callback table is full; the command was not sent.
    #[error("exceed pending commands: {max_pending}")]
    Backpressure { max_pending: usize },

    #[error("Not connected to server")]
    NotConnected,

    #[error("Connection already started")]
    AlreadyStarted,

    /// The connection went away before a result arrived.
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("WebSocket error: {0}")]
    Transport(String),

    /// The server answered with an error-coded frame.
    #[error("Server error: {message}")]
    Protocol { message: String },

    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Only client commands are acknowledged, so only they can be correlated.
    #[error("{0:?} commands cannot carry a callback")]
    Untrackable(yrwatch_proto::CommandType),

    /// A command result without a usable payload.
    #[error("bad command: {0}")]
    BadCommand(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl ClientError {
    /// Whether the error came from the server rather than from this side.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }
}
