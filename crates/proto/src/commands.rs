//! Command messages (`ra2yrproto.commands` package).
//!
//! Each command is sent with `args` filled in; the matching
//! [`CommandResult`](crate::CommandResult) carries the same message type with
//! `result` filled in.

use crate::ra2yr::{GameState, StorageValue};

/// Fetch the full current game state.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GetGameState {
    #[prost(message, optional, tag = "2")]
    pub result: Option<get_game_state::Output>,
}

pub mod get_game_state {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Output {
        #[prost(message, optional, tag = "1")]
        pub state: Option<super::GameState>,
    }
}

/// Read a stored value; the fields set in `args.data` select what to read.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadValue {
    #[prost(message, optional, tag = "1")]
    pub args: Option<read_value::Args>,
    #[prost(message, optional, tag = "2")]
    pub result: Option<read_value::Output>,
}

pub mod read_value {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Args {
        #[prost(message, optional, tag = "1")]
        pub data: Option<super::StorageValue>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Output {
        #[prost(message, optional, tag = "1")]
        pub data: Option<super::StorageValue>,
    }
}

impl ReadValue {
    /// Request for the initial game state snapshot (which carries the type catalog).
    pub fn initial_game_state() -> Self {
        Self {
            args: Some(read_value::Args {
                data: Some(StorageValue {
                    initial_game_state: Some(GameState::default()),
                }),
            }),
            result: None,
        }
    }
}

crate::impl_name!("ra2yrproto.commands", GetGameState, ReadValue);
