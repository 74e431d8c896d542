//! Long-poll cycle bookkeeping.
//!
//! The driver decides *when* a poll must be sent; the session does the sending.
//! At most one poll is outstanding at a time. Time is passed in so the stall
//! guard can be exercised without a clock.
//!
//! A poll replaced by the stall guard may still be answered later. Replies
//! carry nothing that ties them to a poll, so the driver counts replaced polls
//! and lets that many replies through without polling again.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// No poll outstanding.
    Idle,
    /// A poll was sent at `issued_at` and has not been answered.
    Awaiting { issued_at: Instant },
    /// The connection is gone; nothing is polled again.
    Stopped,
}

#[derive(Debug)]
pub struct PollDriver {
    queue_id: Option<u64>,
    phase: PollPhase,
    /// Replaced polls whose reply may still arrive.
    superseded: usize,
    /// A reply was absorbed since the current poll was sent.
    absorbed: bool,
    timeout: Duration,
    stall_grace: Duration,
}

impl PollDriver {
    pub fn new(timeout: Duration, stall_grace: Duration) -> Self {
        Self {
            queue_id: None,
            phase: PollPhase::Idle,
            superseded: 0,
            absorbed: false,
            timeout,
            stall_grace,
        }
    }

    /// The queue adopted from the first acknowledgment.
    pub fn queue_id(&self) -> Option<u64> {
        self.queue_id
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Replaced polls that have not been answered yet.
    pub fn superseded(&self) -> usize {
        self.superseded
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == PollPhase::Stopped
    }

    /// Server-side timeout carried by each poll, in milliseconds.
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Record an acknowledgment. Returns the queue to poll when no poll is
    /// outstanding yet.
    pub fn on_ack(&mut self, queue_id: u64) -> Option<u64> {
        match self.queue_id {
            None => {
                tracing::info!(queue_id, "Result queue assigned");
                self.queue_id = Some(queue_id);
            }
            Some(current) if current != queue_id => {
                tracing::warn!(current, ignored = queue_id, "Acknowledgment names another queue");
            }
            Some(_) => {}
        }

        match self.phase {
            PollPhase::Idle => self.queue_id,
            PollPhase::Awaiting { .. } | PollPhase::Stopped => None,
        }
    }

    /// Record a poll response. Returns the queue to poll again, or `None` when
    /// the response is taken to answer a replaced poll.
    pub fn on_response(&mut self) -> Option<u64> {
        if self.is_stopped() {
            return None;
        }
        if self.superseded > 0 {
            self.superseded -= 1;
            if let PollPhase::Awaiting { .. } = self.phase {
                tracing::debug!(superseded = self.superseded, "Late reply to a replaced poll");
                self.absorbed = true;
                return None;
            }
        }
        self.phase = PollPhase::Idle;
        self.queue_id
    }

    /// Mark a poll as sent at `now`.
    pub fn issued(&mut self, now: Instant) {
        if !self.is_stopped() {
            self.phase = PollPhase::Awaiting { issued_at: now };
            self.absorbed = false;
        }
    }

    /// A poll could not be sent; the next trigger tries again.
    pub fn send_failed(&mut self) {
        if !self.is_stopped() {
            self.phase = PollPhase::Idle;
        }
    }

    /// When the outstanding poll counts as lost.
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            PollPhase::Awaiting { issued_at } => Some(issued_at + self.timeout + self.stall_grace),
            PollPhase::Idle | PollPhase::Stopped => None,
        }
    }

    /// Returns the queue to poll again if the outstanding poll is overdue.
    ///
    /// The overdue poll counts as replaced unless a reply was absorbed while it
    /// was out; that reply was most likely its own.
    pub fn check_stall(&mut self, now: Instant) -> Option<u64> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        if !self.absorbed {
            self.superseded += 1;
        }
        self.absorbed = false;
        tracing::warn!(
            queue_id = ?self.queue_id,
            overdue_ms = u64::try_from(now.saturating_duration_since(deadline).as_millis())
                .unwrap_or(u64::MAX),
            superseded = self.superseded,
            "Poll response overdue, re-polling"
        );
        self.phase = PollPhase::Idle;
        self.queue_id
    }

    pub fn stop(&mut self) {
        self.phase = PollPhase::Stopped;
    }
}
