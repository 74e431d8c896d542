//! Envelope and queue messages (`ra2yrproto` package).

use prost_types::Any;

/// How the server should treat an inbound [`Command`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum CommandType {
    /// Queued command; the server answers with a [`RunCommandAck`].
    ClientCommand = 0,
    ClientCommandOld = 1,
    /// Non-blocking poll of a result queue.
    Poll = 2,
    /// Poll that blocks server-side until results arrive or the timeout expires.
    PollBlocking = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ResponseCode {
    Ok = 0,
    Error = 1,
}

/// Outbound envelope.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Command {
    #[prost(enumeration = "CommandType", tag = "1")]
    pub command_type: i32,
    #[prost(message, optional, tag = "2")]
    pub command: Option<Any>,
}

/// Inbound envelope.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Response {
    #[prost(enumeration = "ResponseCode", tag = "1")]
    pub code: i32,
    #[prost(message, optional, tag = "2")]
    pub body: Option<Any>,
}

/// Acknowledgment of a queued client command.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RunCommandAck {
    /// Correlation id of the queued command.
    #[prost(uint64, tag = "1")]
    pub id: u64,
    /// Result queue of this connection.
    #[prost(uint64, tag = "2")]
    pub queue_id: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CommandResult {
    #[prost(uint64, tag = "1")]
    pub command_id: u64,
    #[prost(message, optional, tag = "2")]
    pub result: Option<Any>,
}

/// Long-poll request (`args`) and its batched answer (`result`).
#[derive(Clone, PartialEq, prost::Message)]
pub struct PollResults {
    #[prost(message, optional, tag = "1")]
    pub args: Option<poll_results::Args>,
    #[prost(message, optional, tag = "2")]
    pub result: Option<poll_results::Output>,
}

pub mod poll_results {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Args {
        #[prost(uint64, tag = "1")]
        pub queue_id: u64,
        /// Server-side timeout in milliseconds.
        #[prost(uint64, tag = "2")]
        pub timeout: u64,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Output {
        #[prost(message, repeated, tag = "1")]
        pub results: Vec<super::CommandResult>,
    }
}

/// Body of an error-coded [`Response`].
#[derive(Clone, PartialEq, prost::Message)]
pub struct TextResponse {
    #[prost(string, tag = "1")]
    pub message: String,
}

crate::impl_name!(
    "ra2yrproto",
    Command,
    Response,
    RunCommandAck,
    CommandResult,
    PollResults,
    TextResponse,
);
