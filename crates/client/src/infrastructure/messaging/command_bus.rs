//! Command dispatch: envelope encoding, callback tracking and backpressure.
//!
//! The [`CommandDispatcher`] wraps opaque command messages into `Command`
//! envelopes and hands the encoded frames to a [`FrameSink`]. Commands sent with
//! a callback are registered in the pending table *before* transmission, so an
//! acknowledgment can never overtake its own registration.

use tokio::sync::mpsc;
use yrwatch_proto::{
    pack, poll_results, Command, CommandType, Message, Name, PollResults, RunCommandAck,
};

use crate::error::ClientError;
use crate::infrastructure::websocket::{AckPolicy, PendingCallback, PendingCommands};

/// Outbound seam: where encoded frames go.
#[cfg_attr(test, mockall::automock)]
pub trait FrameSink: Send {
    fn transmit(&mut self, frame: Vec<u8>) -> Result<(), ClientError>;
}

/// Sink feeding the socket writer task.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { tx }
    }
}

impl FrameSink for ChannelSink {
    fn transmit(&mut self, frame: Vec<u8>) -> Result<(), ClientError> {
        self.tx.send(frame).map_err(|_| ClientError::NotConnected)
    }
}

/// Encode `command` into a `Command` envelope of the given type.
pub fn encode_command<M: Name>(command: &M, command_type: CommandType) -> Vec<u8> {
    Command {
        command_type: command_type as i32,
        command: Some(pack(command)),
    }
    .encode_to_vec()
}

/// Sends commands and tracks the ones awaiting a correlated result.
pub struct CommandDispatcher {
    sink: Box<dyn FrameSink>,
    pending: PendingCommands,
    max_pending: usize,
    ack_policy: AckPolicy,
}

impl CommandDispatcher {
    pub fn new(sink: Box<dyn FrameSink>, max_pending: usize, ack_policy: AckPolicy) -> Self {
        Self {
            sink,
            pending: PendingCommands::default(),
            max_pending,
            ack_policy,
        }
    }

    /// Number of callbacks waiting for a result.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: u64) -> bool {
        self.pending.contains(id)
    }

    /// Encode and transmit `command`.
    ///
    /// With a callback, fails with [`ClientError::Backpressure`] and no side
    /// effect once `max_pending` callbacks are waiting.
    pub fn send<M: Name>(
        &mut self,
        command: &M,
        callback: Option<PendingCallback>,
        command_type: CommandType,
    ) -> Result<(), ClientError> {
        let acknowledged = matches!(
            command_type,
            CommandType::ClientCommand | CommandType::ClientCommandOld
        );
        if callback.is_some() {
            if !acknowledged {
                return Err(ClientError::Untrackable(command_type));
            }
            if self.pending.len() >= self.max_pending {
                return Err(ClientError::Backpressure {
                    max_pending: self.max_pending,
                });
            }
        }

        let frame = encode_command(command, command_type);

        if acknowledged {
            self.pending.register(callback);
        }
        if let Err(e) = self.sink.transmit(frame) {
            if acknowledged {
                self.pending.unregister_last();
            }
            return Err(e);
        }

        tracing::debug!(
            type_url = %M::type_url(),
            command_type = ?command_type,
            pending = self.pending.len(),
            "Command sent"
        );
        Ok(())
    }

    /// Send a blocking long-poll for `queue_id`. Polls are never tracked.
    pub fn send_poll(&mut self, queue_id: u64, timeout_ms: u64) -> Result<(), ClientError> {
        let poll = PollResults {
            args: Some(poll_results::Args {
                queue_id,
                timeout: timeout_ms,
            }),
            result: None,
        };
        self.send(&poll, None, CommandType::PollBlocking)
    }

    /// Apply an acknowledgment's correlation id to waiting commands.
    pub fn on_ack(&mut self, ack: &RunCommandAck) -> usize {
        let assigned = self.pending.assign(ack.id, self.ack_policy);
        tracing::debug!(
            id = ack.id,
            queue_id = ack.queue_id,
            assigned,
            "Command acknowledged"
        );
        assigned
    }

    /// The server rejected the oldest unacknowledged command. Returns its
    /// callback, if it had one.
    pub fn on_error(&mut self) -> Option<PendingCallback> {
        let callback = self.pending.reject_oldest();
        tracing::debug!(
            tracked = callback.is_some(),
            pending = self.pending.len(),
            "Command rejected"
        );
        callback
    }

    /// Remove the callback waiting for `id`, if any.
    pub fn take(&mut self, id: u64) -> Option<PendingCallback> {
        self.pending.take(id)
    }

    /// Remove every waiting callback (connection teardown).
    pub fn drain(&mut self) -> Vec<PendingCallback> {
        self.pending.drain()
    }
}
