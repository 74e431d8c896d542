//! Connection lifecycle types.
//!
//! This module provides the connection state machine, a lock-free observer
//! for it, and the notices delivered through the close callback.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::ClientError;

/// Lifecycle state of the game server connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started yet
    None,
    /// Transport is opening
    Connecting,
    /// Transport reported open
    Connected,
    /// Closed normally (terminal)
    Closed,
    /// Closed by a transport failure (terminal)
    Error,
}

impl ConnectionState {
    /// Convert to u8 for atomic storage.
    pub fn to_u8(self) -> u8 {
        match self {
            ConnectionState::None => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Closed => 3,
            ConnectionState::Error => 4,
        }
    }

    /// Convert from u8 (atomic storage).
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Closed,
            4 => ConnectionState::Error,
            _ => ConnectionState::None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Error)
    }
}

/// What the close callback is told.
///
/// `Closed` and `TransportError` end the connection. `ProtocolError` reports a
/// single bad frame; the connection keeps processing.
#[derive(Debug)]
pub enum ConnectionNotice {
    Closed,
    TransportError(ClientError),
    ProtocolError(ClientError),
}

impl ConnectionNotice {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConnectionNotice::ProtocolError(_))
    }

    /// Terminal state this notice leads to, if any.
    pub fn terminal_state(&self) -> Option<ConnectionState> {
        match self {
            ConnectionNotice::Closed => Some(ConnectionState::Closed),
            ConnectionNotice::TransportError(_) => Some(ConnectionState::Error),
            ConnectionNotice::ProtocolError(_) => None,
        }
    }
}

/// Observable connection state for UI binding.
///
/// Multiple observers can share the same underlying state.
#[derive(Clone)]
pub struct ConnectionStateObserver {
    state: Arc<AtomicU8>,
}

impl ConnectionStateObserver {
    pub fn new(state: Arc<AtomicU8>) -> Self {
        Self { state }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// Update the shared connection state.
pub fn set_connection_state(state_ref: &AtomicU8, new_state: ConnectionState) {
    state_ref.store(new_state.to_u8(), Ordering::SeqCst);
}

/// Move `None` to `Connecting`. Fails if the connection was already started.
pub fn begin_connecting(state_ref: &AtomicU8) -> Result<(), ClientError> {
    state_ref
        .compare_exchange(
            ConnectionState::None.to_u8(),
            ConnectionState::Connecting.to_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        )
        .map(|_| ())
        .map_err(|_| ClientError::AlreadyStarted)
}
