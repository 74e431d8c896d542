//! Protocol session: everything one connection knows, without any I/O.
//!
//! The session owns the command dispatcher, the poll driver and the game state
//! model. Inbound frames go through [`ProtocolSession::handle_frame`], which
//! returns the callbacks and state notifications to run. The caller runs them
//! after releasing whatever lock guards the session, in the returned order.

use tokio::time::Instant;
use yrwatch_proto::{CommandResult, CommandType, Name, PollResults, RunCommandAck};

use crate::application::state::{extract_state, GameStateModel, StateUpdate};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::infrastructure::messaging::{CommandDispatcher, FrameSink};

use super::core::PendingCallback;
use super::decoder::{parse_response, ParsedResponse};
use super::poll::PollDriver;

/// Work produced by a frame, to be run outside the session lock.
pub enum SessionEffect {
    /// A pending command's result arrived.
    Resolved {
        callback: PendingCallback,
        result: CommandResult,
    },
    /// The server rejected a pending command.
    Failed {
        callback: PendingCallback,
        error: ClientError,
    },
    StateUpdated(StateUpdate),
    /// An error-coded frame, reported upward without ending the connection.
    ServerError(ClientError),
}

impl std::fmt::Debug for SessionEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEffect::Resolved { result, .. } => f
                .debug_struct("Resolved")
                .field("command_id", &result.command_id)
                .finish_non_exhaustive(),
            SessionEffect::Failed { error, .. } => f
                .debug_struct("Failed")
                .field("error", error)
                .finish_non_exhaustive(),
            SessionEffect::StateUpdated(update) => f
                .debug_tuple("StateUpdated")
                .field(&update.field())
                .finish(),
            SessionEffect::ServerError(error) => {
                f.debug_tuple("ServerError").field(error).finish()
            }
        }
    }
}

pub struct ProtocolSession {
    dispatcher: CommandDispatcher,
    poll: PollDriver,
    model: GameStateModel,
}

impl ProtocolSession {
    pub fn new(sink: Box<dyn FrameSink>, config: &ClientConfig) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(sink, config.max_pending, config.ack_policy),
            poll: PollDriver::new(config.poll_timeout, config.poll_stall_grace),
            model: GameStateModel::default(),
        }
    }

    pub fn model(&self) -> &GameStateModel {
        &self.model
    }

    pub fn poll(&self) -> &PollDriver {
        &self.poll
    }

    pub fn pending_len(&self) -> usize {
        self.dispatcher.pending_len()
    }

    /// Send a command. Fails with [`ClientError::NotConnected`] after teardown.
    pub fn send<M: Name>(
        &mut self,
        command: &M,
        callback: Option<PendingCallback>,
        command_type: CommandType,
    ) -> Result<(), ClientError> {
        if self.poll.is_stopped() {
            return Err(ClientError::NotConnected);
        }
        self.dispatcher.send(command, callback, command_type)
    }

    /// Process one inbound frame.
    ///
    /// An error-coded frame answers the oldest unacknowledged command; that
    /// command fails with the server's message. Undecodable frames are returned
    /// as errors. The session stays usable either way.
    pub fn handle_frame(
        &mut self,
        frame: &[u8],
        now: Instant,
    ) -> Result<Vec<SessionEffect>, ClientError> {
        let mut effects = Vec::new();
        let parsed = match parse_response(frame) {
            Ok(parsed) => parsed,
            Err(ClientError::Protocol { message }) => {
                if let Some(callback) = self.dispatcher.on_error() {
                    effects.push(SessionEffect::Failed {
                        callback,
                        error: ClientError::Protocol {
                            message: message.clone(),
                        },
                    });
                }
                effects.push(SessionEffect::ServerError(ClientError::Protocol { message }));
                return Ok(effects);
            }
            Err(e) => return Err(e),
        };
        match parsed {
            ParsedResponse::Ack(ack) => self.on_ack(&ack, now),
            ParsedResponse::PollResults(batch) => self.on_poll_results(batch, now, &mut effects),
            ParsedResponse::Other { type_url } => {
                tracing::debug!(%type_url, "Ignoring response");
            }
        }
        Ok(effects)
    }

    /// When the outstanding poll should be considered lost.
    pub fn poll_deadline(&self) -> Option<Instant> {
        self.poll.deadline()
    }

    /// Re-issue the poll if it is overdue.
    pub fn check_stall(&mut self, now: Instant) {
        if let Some(queue_id) = self.poll.check_stall(now) {
            self.issue_poll(queue_id, now);
        }
    }

    /// Stop polling and hand back every callback still waiting.
    pub fn teardown(&mut self) -> Vec<PendingCallback> {
        self.poll.stop();
        self.dispatcher.drain()
    }

    fn on_ack(&mut self, ack: &RunCommandAck, now: Instant) {
        self.dispatcher.on_ack(ack);
        if let Some(queue_id) = self.poll.on_ack(ack.queue_id) {
            self.issue_poll(queue_id, now);
        }
    }

    fn on_poll_results(
        &mut self,
        batch: PollResults,
        now: Instant,
        effects: &mut Vec<SessionEffect>,
    ) {
        if let Some(queue_id) = self.poll.on_response() {
            self.issue_poll(queue_id, now);
        }

        let results = batch.result.map(|output| output.results).unwrap_or_default();
        tracing::debug!(count = results.len(), "Poll results");

        for result in results {
            let updates = match extract_state(&result) {
                Ok(Some(partial)) => self.model.merge(partial),
                Ok(None) => Vec::new(),
                Err(e) => {
                    tracing::warn!(
                        command_id = result.command_id,
                        error = %e,
                        "Skipping undecodable result payload"
                    );
                    Vec::new()
                }
            };
            if let Some(callback) = self.dispatcher.take(result.command_id) {
                effects.push(SessionEffect::Resolved { callback, result });
            }
            effects.extend(updates.into_iter().map(SessionEffect::StateUpdated));
        }
    }

    fn issue_poll(&mut self, queue_id: u64, now: Instant) {
        match self.dispatcher.send_poll(queue_id, self.poll.timeout_ms()) {
            Ok(()) => self.poll.issued(now),
            Err(e) => {
                tracing::warn!(queue_id, error = %e, "Could not send poll");
                self.poll.send_failed();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use yrwatch_proto::commands::{get_game_state, GetGameState, ReadValue};
    use yrwatch_proto::ra2yr::{GameState, House, ObjectTypeClass};
    use yrwatch_proto::Any;

    use crate::application::state::StateField;
    use crate::infrastructure::messaging::command_bus::test_support::RecordingSink;
    use crate::infrastructure::websocket::core::AckPolicy;
    use crate::infrastructure::websocket::decoder::test_frames::*;
    use crate::infrastructure::websocket::PollPhase;

    type Log = Arc<Mutex<Vec<String>>>;

    fn session(policy: AckPolicy) -> (ProtocolSession, RecordingSink) {
        let sink = RecordingSink::default();
        let config = ClientConfig {
            ack_policy: policy,
            ..ClientConfig::default()
        };
        (ProtocolSession::new(Box::new(sink.clone()), &config), sink)
    }

    fn logging_callback(log: &Log, tag: &str) -> PendingCallback {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        Box::new(move |result| {
            let entry = match result {
                Ok(r) => format!("{}:{}", tag, r.command_id),
                Err(e) => format!("{}:{}", tag, e),
            };
            log.lock().unwrap().push(entry);
        })
    }

    /// Run effects the way the client does and return the state fields touched.
    fn run(effects: Vec<SessionEffect>) -> Vec<StateField> {
        let mut fields = Vec::new();
        for effect in effects {
            match effect {
                SessionEffect::Resolved { callback, result } => callback(Ok(result)),
                SessionEffect::Failed { callback, error } => callback(Err(error)),
                SessionEffect::StateUpdated(update) => fields.push(update.field()),
                SessionEffect::ServerError(_) => {}
            }
        }
        fields
    }

    fn send_tracked(session: &mut ProtocolSession, log: &Log, tag: &str) {
        session
            .send(
                &GetGameState::default(),
                Some(logging_callback(log, tag)),
                CommandType::ClientCommand,
            )
            .unwrap();
    }

    fn polls(sink: &RecordingSink) -> Vec<PollResults> {
        sink.sent(CommandType::PollBlocking)
    }

    #[test]
    fn ack_then_batch_resolves_the_command_once() {
        let (mut session, _sink) = session(AckPolicy::OldestFirst);
        let log: Log = Arc::default();
        let now = Instant::now();
        send_tracked(&mut session, &log, "a");

        run(session.handle_frame(&ack_frame(7, 3), now).unwrap());
        run(session
            .handle_frame(&poll_frame(vec![empty_result(7)]), now)
            .unwrap());
        run(session
            .handle_frame(&poll_frame(vec![empty_result(7)]), now)
            .unwrap());

        assert_eq!(*log.lock().unwrap(), vec!["a:7"]);
        assert_eq!(session.pending_len(), 0);
    }

    #[test]
    fn each_callback_gets_the_result_for_its_own_id() {
        let (mut session, _sink) = session(AckPolicy::OldestFirst);
        let log: Log = Arc::default();
        let now = Instant::now();

        send_tracked(&mut session, &log, "a");
        send_tracked(&mut session, &log, "b");
        session
            .send(&GetGameState::default(), None, CommandType::ClientCommand)
            .unwrap();
        send_tracked(&mut session, &log, "c");

        for id in 10..=13 {
            run(session.handle_frame(&ack_frame(id, 1), now).unwrap());
        }
        run(session
            .handle_frame(
                &poll_frame(vec![
                    empty_result(13),
                    empty_result(12),
                    empty_result(10),
                    empty_result(11),
                ]),
                now,
            )
            .unwrap());

        assert_eq!(*log.lock().unwrap(), vec!["c:13", "a:10", "b:11"]);
        assert_eq!(session.pending_len(), 0);
    }

    #[test]
    fn assign_all_shares_one_id_across_unacknowledged_sends() {
        let (mut session, _sink) = session(AckPolicy::AssignAll);
        let log: Log = Arc::default();
        let now = Instant::now();

        send_tracked(&mut session, &log, "a");
        send_tracked(&mut session, &log, "b");
        run(session.handle_frame(&ack_frame(5, 1), now).unwrap());
        run(session.handle_frame(&ack_frame(6, 1), now).unwrap());

        run(session
            .handle_frame(&poll_frame(vec![empty_result(6)]), now)
            .unwrap());
        assert!(log.lock().unwrap().is_empty());

        run(session
            .handle_frame(&poll_frame(vec![empty_result(5), empty_result(5)]), now)
            .unwrap());
        assert_eq!(*log.lock().unwrap(), vec!["a:5", "b:5"]);
    }

    #[test]
    fn unmatched_results_are_dropped() {
        let (mut session, _sink) = session(AckPolicy::OldestFirst);
        let effects = session
            .handle_frame(&poll_frame(vec![empty_result(99)]), Instant::now())
            .unwrap();
        assert!(effects.is_empty());
    }

    #[test]
    fn error_frame_fails_the_rejected_command_and_keeps_acks_in_step() {
        let (mut session, _sink) = session(AckPolicy::OldestFirst);
        let log: Log = Arc::default();
        let now = Instant::now();
        send_tracked(&mut session, &log, "bad");

        let effects = session.handle_frame(&error_frame("rejected"), now).unwrap();
        assert!(matches!(
            effects.last(),
            Some(SessionEffect::ServerError(ClientError::Protocol { message })) if message == "rejected"
        ));
        run(effects);
        assert_eq!(session.pending_len(), 0);

        send_tracked(&mut session, &log, "good");
        run(session.handle_frame(&ack_frame(9, 1), now).unwrap());
        run(session
            .handle_frame(&poll_frame(vec![empty_result(9)]), now)
            .unwrap());
        assert_eq!(*log.lock().unwrap(), vec!["bad:rejected", "good:9"]);
    }

    #[test]
    fn error_frame_with_nothing_waiting_is_only_reported() {
        let (mut session, _sink) = session(AckPolicy::OldestFirst);
        let effects = session
            .handle_frame(&error_frame("boom"), Instant::now())
            .unwrap();
        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], SessionEffect::ServerError(_)));
    }

    #[test]
    fn undecodable_frame_is_an_error() {
        let (mut session, _sink) = session(AckPolicy::OldestFirst);
        let err = session
            .handle_frame(&[0xff, 0xff, 0xff], Instant::now())
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn poll_loop_keeps_one_poll_in_flight() {
        let (mut session, sink) = session(AckPolicy::OldestFirst);
        let now = Instant::now();
        assert!(polls(&sink).is_empty());

        for _ in 0..3 {
            session
                .send(&GetGameState::default(), None, CommandType::ClientCommand)
                .unwrap();
            run(session.handle_frame(&ack_frame(1, 3), now).unwrap());
        }
        assert_eq!(polls(&sink).len(), 1);

        run(session.handle_frame(&poll_frame(Vec::new()), now).unwrap());
        run(session.handle_frame(&poll_frame(Vec::new()), now).unwrap());

        let sent = polls(&sink);
        assert_eq!(sent.len(), 3);
        assert!(sent
            .iter()
            .all(|p| p.args.as_ref().map(|a| (a.queue_id, a.timeout)) == Some((3, 5_000))));
    }

    #[test]
    fn overdue_poll_is_reissued() {
        let (mut session, sink) = session(AckPolicy::OldestFirst);
        let start = Instant::now();
        run(session.handle_frame(&ack_frame(1, 3), start).unwrap());

        session.check_stall(start + Duration::from_millis(6_000));
        assert_eq!(polls(&sink).len(), 1);

        session.check_stall(start + Duration::from_millis(7_000));
        assert_eq!(polls(&sink).len(), 2);
        assert_eq!(
            session.poll_deadline(),
            Some(start + Duration::from_millis(14_000))
        );
    }

    #[test]
    fn late_replies_after_a_stall_leave_one_poll_outstanding() {
        let (mut session, sink) = session(AckPolicy::OldestFirst);
        let start = Instant::now();
        run(session.handle_frame(&ack_frame(1, 3), start).unwrap());
        session.check_stall(start + Duration::from_millis(7_000));
        assert_eq!(polls(&sink).len(), 2);

        let later = start + Duration::from_millis(7_500);
        run(session.handle_frame(&poll_frame(Vec::new()), later).unwrap());
        run(session.handle_frame(&poll_frame(Vec::new()), later).unwrap());

        // three sent, two answered
        assert_eq!(polls(&sink).len(), 3);
        assert!(matches!(session.poll().phase(), PollPhase::Awaiting { .. }));

        run(session.handle_frame(&poll_frame(Vec::new()), later).unwrap());
        assert_eq!(polls(&sink).len(), 4);
    }

    #[test]
    fn game_state_result_updates_model_after_callback() {
        let (mut session, _sink) = session(AckPolicy::OldestFirst);
        let log: Log = Arc::default();
        let now = Instant::now();
        send_tracked(&mut session, &log, "a");
        run(session.handle_frame(&ack_frame(2, 1), now).unwrap());

        let state = GetGameState {
            result: Some(get_game_state::Output {
                state: Some(GameState {
                    houses: vec![House {
                        name: "Soviets".into(),
                        ..House::default()
                    }],
                    ..GameState::default()
                }),
            }),
        };
        let effects = session
            .handle_frame(&poll_frame(vec![command_result(2, &state)]), now)
            .unwrap();

        assert!(matches!(effects[0], SessionEffect::Resolved { .. }));
        let fields = run(effects);
        // empty catalog is not strictly longer than the stored one
        assert_eq!(
            fields,
            vec![StateField::Factories, StateField::Houses, StateField::Objects]
        );
        assert_eq!(session.model().houses[0].name, "Soviets");
        assert_eq!(*log.lock().unwrap(), vec!["a:2"]);
    }

    #[test]
    fn undecodable_payload_does_not_abort_the_batch() {
        let (mut session, _sink) = session(AckPolicy::OldestFirst);
        let log: Log = Arc::default();
        let now = Instant::now();
        send_tracked(&mut session, &log, "a");
        send_tracked(&mut session, &log, "b");
        run(session.handle_frame(&ack_frame(1, 1), now).unwrap());
        run(session.handle_frame(&ack_frame(2, 1), now).unwrap());

        let broken = CommandResult {
            command_id: 1,
            result: Some(Any {
                type_url: GetGameState::type_url(),
                value: vec![0xff, 0xff, 0xff],
            }),
        };
        let catalog = ReadValue {
            args: None,
            result: Some(yrwatch_proto::commands::read_value::Output {
                data: Some(yrwatch_proto::ra2yr::StorageValue {
                    initial_game_state: Some(GameState {
                        object_types: vec![ObjectTypeClass {
                            name: "E1".into(),
                            pointer_self: 1,
                        }],
                        ..GameState::default()
                    }),
                }),
            }),
        };
        let fields = run(session
            .handle_frame(
                &poll_frame(vec![broken, command_result(2, &catalog)]),
                now,
            )
            .unwrap());

        assert_eq!(fields, vec![StateField::ObjectTypes]);
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:2"]);
    }

    #[test]
    fn teardown_returns_waiting_callbacks_and_stops() {
        let (mut session, sink) = session(AckPolicy::OldestFirst);
        let log: Log = Arc::default();
        let now = Instant::now();
        send_tracked(&mut session, &log, "a");
        send_tracked(&mut session, &log, "b");
        run(session.handle_frame(&ack_frame(4, 1), now).unwrap());

        for callback in session.teardown() {
            callback(Err(ClientError::ConnectionClosed));
        }
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:Connection closed", "b:Connection closed"]
        );
        assert_eq!(session.pending_len(), 0);

        let err = session
            .send(&GetGameState::default(), None, CommandType::ClientCommand)
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));

        run(session.handle_frame(&poll_frame(Vec::new()), now).unwrap());
        assert_eq!(polls(&sink).len(), 1);
    }
}
