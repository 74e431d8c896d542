//! yrwatch Proto - ra2yr protocol messages
//!
//! This crate declares the subset of the ra2yr protobuf schema that the client
//! puts on (or takes off) the wire:
//! - Envelopes (`Command`, `Response`) and their enums
//! - Queue plumbing (`RunCommandAck`, `PollResults`, `CommandResult`)
//! - The two commands the client understands (`GetGameState`, `ReadValue`)
//! - Game state snapshots (`GameState` and its element types)
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only prost and prost-types
//! 2. **No business logic** - Pure message types, hand-derived with `prost`
//! 3. **Exact type tags** - Every message implements [`prost::Name`] with a
//!    `type.googleapis.com/<full name>` type url, so `Any` payloads can be
//!    matched by identity

pub mod commands;
pub mod envelope;
pub mod ra2yr;

pub use prost::{Message, Name};
pub use prost_types::Any;

pub use crate::envelope::{
    poll_results, Command, CommandResult, CommandType, PollResults, Response, ResponseCode,
    RunCommandAck, TextResponse,
};

/// Prefix of every type url produced by this crate.
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com";

/// Implements [`prost::Name`] with the `type.googleapis.com/` type url prefix.
macro_rules! impl_name {
    ($package:literal, $($ty:ident),+ $(,)?) => {
        $(
            impl ::prost::Name for $ty {
                const NAME: &'static str = stringify!($ty);
                const PACKAGE: &'static str = $package;

                fn full_name() -> String {
                    format!("{}.{}", Self::PACKAGE, Self::NAME)
                }

                fn type_url() -> String {
                    format!("{}/{}", $crate::TYPE_URL_PREFIX, Self::full_name())
                }
            }
        )+
    };
}

pub(crate) use impl_name;

/// Wrap a message into an `Any` carrying its type url.
pub fn pack<M: Name>(message: &M) -> Any {
    Any {
        type_url: M::type_url(),
        value: message.encode_to_vec(),
    }
}

/// Decode an `Any` as `M` if (and only if) its type url is exactly `M`'s.
///
/// Returns `None` for a different type url, `Some(Err)` when the tag matches
/// but the bytes do not decode.
pub fn unpack<M: Name + Default>(any: &Any) -> Option<Result<M, prost::DecodeError>> {
    if any.type_url != M::type_url() {
        return None;
    }
    Some(M::decode(any.value.as_slice()))
}
