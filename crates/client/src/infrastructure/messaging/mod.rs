//! Command dispatch and connection lifecycle.
//!
//! - `CommandDispatcher`: encode commands, track callbacks, enforce backpressure
//! - `ConnectionStateObserver` / `ConnectionNotice`: lifecycle observation
//!
//! The WebSocket client (in the websocket module) connects these to the transport.

pub mod command_bus;
pub mod connection;

pub use command_bus::{encode_command, ChannelSink, CommandDispatcher, FrameSink};
pub use connection::{
    begin_connecting, set_connection_state, ConnectionNotice, ConnectionState,
    ConnectionStateObserver,
};
