//! Runtime-agnostic core of the command correlation logic.
//!
//! This is free of any tokio / socket dependencies. The dispatcher owns a
//! [`PendingCommands`] table and calls into it when commands are sent, when
//! acknowledgments assign correlation ids, and when results arrive.

use std::collections::{HashMap, VecDeque};

use yrwatch_proto::CommandResult;

use crate::error::ClientError;

/// Callback invoked exactly once with a command's correlated result, or with
/// an error if the connection goes away first.
pub type PendingCallback = Box<dyn FnOnce(Result<CommandResult, ClientError>) + Send + 'static>;

/// How an acknowledgment's correlation id is handed to waiting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPolicy {
    /// Each acknowledgment belongs to the oldest client command still waiting
    /// for one, tracked or not. Ids stay unique while outstanding.
    #[default]
    OldestFirst,
    /// Every placeholder without an id takes the acknowledged id. Several
    /// unacknowledged sends end up sharing one id; results then resolve them in
    /// registration order.
    AssignAll,
}

impl std::fmt::Display for AckPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AckPolicy::OldestFirst => write!(f, "oldest_first"),
            AckPolicy::AssignAll => write!(f, "assign_all"),
        }
    }
}

impl std::str::FromStr for AckPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oldest_first" | "oldestfirst" | "fifo" => Ok(AckPolicy::OldestFirst),
            "assign_all" | "assignall" | "all" => Ok(AckPolicy::AssignAll),
            _ => Err(()),
        }
    }
}

/// Tracks commands waiting for a correlated result.
///
/// Sent client commands first sit in an acknowledgment queue in send order
/// (untracked ones as `None`), then move to an id-keyed map once an
/// acknowledgment assigns their correlation id.
#[derive(Default)]
pub struct PendingCommands {
    awaiting_ack: VecDeque<Option<PendingCallback>>,
    by_id: HashMap<u64, VecDeque<PendingCallback>>,
    tracked: usize,
}

impl PendingCommands {
    /// Number of callbacks waiting, with or without an assigned id.
    pub fn len(&self) -> usize {
        self.tracked
    }

    pub fn is_empty(&self) -> bool {
        self.tracked == 0
    }

    /// Number of callbacks still waiting for an acknowledgment.
    pub fn unassigned(&self) -> usize {
        self.awaiting_ack.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Record a sent client command. Must happen before the frame is
    /// transmitted so an early acknowledgment finds it.
    pub fn register(&mut self, callback: Option<PendingCallback>) {
        if callback.is_some() {
            self.tracked += 1;
        }
        self.awaiting_ack.push_back(callback);
    }

    /// Undo the most recent [`register`](Self::register).
    pub fn unregister_last(&mut self) {
        if let Some(Some(_)) = self.awaiting_ack.pop_back() {
            self.tracked -= 1;
        }
    }

    /// Hand an acknowledged id to waiting commands. Returns how many callbacks
    /// received it.
    pub fn assign(&mut self, id: u64, policy: AckPolicy) -> usize {
        let slots: Vec<Option<PendingCallback>> = match policy {
            AckPolicy::OldestFirst => self.awaiting_ack.pop_front().into_iter().collect(),
            AckPolicy::AssignAll => self.awaiting_ack.drain(..).collect(),
        };

        let mut assigned = 0;
        for callback in slots.into_iter().flatten() {
            self.by_id.entry(id).or_default().push_back(callback);
            assigned += 1;
        }
        assigned
    }

    /// Drop the oldest command still waiting for an acknowledgment. Returns its
    /// callback when it was tracked.
    ///
    /// The server answers a command it rejects with an error frame in place of
    /// the acknowledgment, so that command's slot must go.
    pub fn reject_oldest(&mut self) -> Option<PendingCallback> {
        let callback = self.awaiting_ack.pop_front()??;
        self.tracked -= 1;
        Some(callback)
    }

    /// Remove the first callback registered under `id`.
    pub fn take(&mut self, id: u64) -> Option<PendingCallback> {
        let queue = self.by_id.get_mut(&id)?;
        let callback = queue.pop_front();
        if queue.is_empty() {
            self.by_id.remove(&id);
        }
        if callback.is_some() {
            self.tracked -= 1;
        }
        callback
    }

    /// Remove every waiting callback, acknowledged or not, in registration order
    /// of acknowledgment followed by send order.
    pub fn drain(&mut self) -> Vec<PendingCallback> {
        let mut ids: Vec<u64> = self.by_id.keys().copied().collect();
        ids.sort_unstable();

        let mut callbacks: Vec<PendingCallback> = Vec::with_capacity(self.tracked);
        for id in ids {
            if let Some(queue) = self.by_id.remove(&id) {
                callbacks.extend(queue);
            }
        }
        callbacks.extend(self.awaiting_ack.drain(..).flatten());
        self.tracked = 0;
        callbacks
    }
}
