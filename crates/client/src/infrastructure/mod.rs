pub mod messaging;
pub mod websocket;

pub use messaging::{ConnectionNotice, ConnectionState, ConnectionStateObserver};
