//! Inbound frame decoding.
//!
//! Unwraps the `Response` envelope into a status code plus a still-opaque
//! payload, then lifts out the two bodies the client reacts to. Type tags are
//! matched by exact identity.

use prost::Message;
use yrwatch_proto::{
    unpack, CommandResult, Name, PollResults, Response, ResponseCode, RunCommandAck, TextResponse,
};

use crate::error::ClientError;

/// Envelope contents before the body is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub code: ResponseCode,
    pub type_url: String,
    pub body: Vec<u8>,
}

/// Inbound message with the bodies the client understands lifted out.
#[derive(Debug)]
pub enum ParsedResponse {
    Ack(RunCommandAck),
    PollResults(PollResults),
    Other { type_url: String },
}

/// Decode the envelope. A missing body decodes as an empty tag and payload.
pub fn decode_response(data: &[u8]) -> Result<RawResponse, ClientError> {
    let response = Response::decode(data)?;
    let code = response.code();
    let (type_url, body) = match response.body {
        Some(any) => (any.type_url, any.value),
        None => (String::new(), Vec::new()),
    };
    Ok(RawResponse {
        code,
        type_url,
        body,
    })
}

/// Decode a frame and classify it.
///
/// An error-coded frame yields [`ClientError::Protocol`] carrying the server's
/// text message.
pub fn parse_response(data: &[u8]) -> Result<ParsedResponse, ClientError> {
    let raw = decode_response(data)?;

    if raw.code == ResponseCode::Error {
        let text = TextResponse::decode(raw.body.as_slice())?;
        return Err(ClientError::Protocol {
            message: text.message,
        });
    }

    if raw.type_url == RunCommandAck::type_url() {
        Ok(ParsedResponse::Ack(RunCommandAck::decode(raw.body.as_slice())?))
    } else if raw.type_url == PollResults::type_url() {
        Ok(ParsedResponse::PollResults(PollResults::decode(
            raw.body.as_slice(),
        )?))
    } else {
        Ok(ParsedResponse::Other {
            type_url: raw.type_url,
        })
    }
}

/// Decode a command result's payload as the command message `M`.
pub fn decode_command_result<M: Name + Default>(result: &CommandResult) -> Result<M, ClientError> {
    let any = result
        .result
        .as_ref()
        .filter(|any| !any.value.is_empty())
        .ok_or_else(|| {
            ClientError::BadCommand(format!("command {} has no result", result.command_id))
        })?;

    match unpack::<M>(any) {
        Some(decoded) => Ok(decoded?),
        None => Err(ClientError::BadCommand(format!(
            "expected {}, got {}",
            M::type_url(),
            any.type_url
        ))),
    }
}
