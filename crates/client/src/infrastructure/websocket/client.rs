//! WebSocket client for the game server using tokio-tungstenite.

use std::sync::atomic::AtomicU8;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use yrwatch_proto::commands::{GetGameState, ReadValue};
use yrwatch_proto::ra2yr::ObjectTypeClass;
use yrwatch_proto::{CommandResult, CommandType, Name};

use crate::application::state::{GameStateModel, StateUpdate};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::infrastructure::messaging::{
    begin_connecting, set_connection_state, ChannelSink, ConnectionNotice, ConnectionState,
    ConnectionStateObserver,
};

use super::core::PendingCallback;
use super::decoder::decode_command_result;
use super::session::{ProtocolSession, SessionEffect};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type OpenHandler = Box<dyn Fn() + Send + Sync>;
type StateUpdateHandler = Box<dyn Fn(StateUpdate) + Send + Sync>;
type CloseHandler = Box<dyn Fn(ConnectionNotice) + Send + Sync>;

/// Upward callbacks. All of them run on the connection task, never while the
/// session is locked.
#[derive(Default)]
pub struct ClientHandlers {
    on_open: Option<OpenHandler>,
    on_state_update: Option<StateUpdateHandler>,
    on_close: Option<CloseHandler>,
}

impl ClientHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Box::new(f));
        self
    }

    pub fn on_state_update(mut self, f: impl Fn(StateUpdate) + Send + Sync + 'static) -> Self {
        self.on_state_update = Some(Box::new(f));
        self
    }

    pub fn on_close(mut self, f: impl Fn(ConnectionNotice) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Box::new(f));
        self
    }

    fn open(&self) {
        if let Some(ref cb) = self.on_open {
            cb();
        }
    }

    fn state_update(&self, update: StateUpdate) {
        if let Some(ref cb) = self.on_state_update {
            cb(update);
        }
    }

    fn close(&self, notice: ConnectionNotice) {
        if let Some(ref cb) = self.on_close {
            cb(notice);
        }
    }
}

/// Handle to one game server connection. Clones share the connection.
pub struct ApiClient {
    config: Arc<ClientConfig>,
    handlers: Arc<ClientHandlers>,
    state: Arc<AtomicU8>,
    session: Arc<Mutex<Option<ProtocolSession>>>,
    shutdown: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, handlers: ClientHandlers) -> Self {
        Self {
            config: Arc::new(config),
            handlers: Arc::new(handlers),
            state: Arc::new(AtomicU8::new(ConnectionState::None.to_u8())),
            session: Arc::new(Mutex::new(None)),
            shutdown: Arc::new(Mutex::new(None)),
            task: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn observer(&self) -> ConnectionStateObserver {
        ConnectionStateObserver::new(Arc::clone(&self.state))
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.observer().state()
    }

    /// Snapshot of the merged game state.
    pub async fn game_state(&self) -> GameStateModel {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.model().clone())
            .unwrap_or_default()
    }

    /// Number of callbacks waiting for a result.
    pub async fn pending_len(&self) -> usize {
        self.session
            .lock()
            .await
            .as_ref()
            .map_or(0, ProtocolSession::pending_len)
    }

    /// Open the connection and start processing frames. Can be called once.
    pub async fn connect(&self) -> Result<(), ClientError> {
        begin_connecting(&self.state)?;

        let url = match self.config.url() {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(error = %e, "Refusing to connect");
                set_connection_state(&self.state, ConnectionState::Error);
                return Err(e);
            }
        };

        let ws_stream = match connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                tracing::error!("Failed to connect to game server: {}", e);
                set_connection_state(&self.state, ConnectionState::Error);
                self.handlers
                    .close(ConnectionNotice::TransportError(ClientError::Transport(
                        e.to_string(),
                    )));
                return Err(e.into());
            }
        };
        tracing::info!("Connected to game server at {}", url);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        {
            let mut session = self.session.lock().await;
            *session = Some(ProtocolSession::new(
                Box::new(ChannelSink::new(outbound_tx)),
                &self.config,
            ));
        }
        *self.shutdown.lock().await = Some(shutdown_tx);

        set_connection_state(&self.state, ConnectionState::Connected);
        self.handlers.open();

        let handle = tokio::spawn(run_connection(
            ws_stream,
            outbound_rx,
            shutdown_rx,
            Arc::clone(&self.session),
            Arc::clone(&self.handlers),
            Arc::clone(&self.state),
        ));
        *self.task.lock().await = Some(handle);

        Ok(())
    }

    /// Send `command` with an optional result callback.
    pub async fn send<M: Name>(
        &self,
        command: &M,
        callback: Option<PendingCallback>,
        command_type: CommandType,
    ) -> Result<(), ClientError> {
        let mut session = self.session.lock().await;
        let session = session.as_mut().ok_or(ClientError::NotConnected)?;
        session.send(command, callback, command_type)
    }

    /// Send an untracked client command.
    pub async fn send_command<M: Name>(&self, command: &M) -> Result<(), ClientError> {
        self.send(command, None, CommandType::ClientCommand).await
    }

    /// Send a client command and wait for its result.
    pub async fn request<M: Name>(&self, command: &M) -> Result<CommandResult, ClientError> {
        let (tx, rx) = oneshot::channel();
        let callback: PendingCallback = Box::new(move |result| {
            let _ = tx.send(result);
        });
        self.send(command, Some(callback), CommandType::ClientCommand)
            .await?;
        rx.await.map_err(|_| ClientError::ConnectionClosed)?
    }

    /// Ask for a full game state; it arrives through `on_state_update`.
    pub async fn get_game_state(&self) -> Result<(), ClientError> {
        self.send_command(&GetGameState::default()).await
    }

    /// Read the type catalog from the initial game state.
    pub async fn fetch_object_types(&self) -> Result<Vec<ObjectTypeClass>, ClientError> {
        let result = self.request(&ReadValue::initial_game_state()).await?;
        let read: ReadValue = decode_command_result(&result)?;
        Ok(read
            .result
            .and_then(|r| r.data)
            .and_then(|data| data.initial_game_state)
            .map(|state| state.object_types)
            .unwrap_or_default())
    }

    /// Close the connection and wait until teardown has finished.
    pub async fn disconnect(&self) {
        if let Some(shutdown) = self.shutdown.lock().await.take() {
            let _ = shutdown.send(());
        }
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!("Connection task failed: {}", e);
            }
        }
    }
}

impl Clone for ApiClient {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            handlers: Arc::clone(&self.handlers),
            state: Arc::clone(&self.state),
            session: Arc::clone(&self.session),
            shutdown: Arc::clone(&self.shutdown),
            task: Arc::clone(&self.task),
        }
    }
}

async fn stall_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Connection task: moves frames between the socket and the session until the
/// connection ends, then tears the session down.
async fn run_connection(
    ws_stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    mut shutdown: oneshot::Receiver<()>,
    session: Arc<Mutex<Option<ProtocolSession>>>,
    handlers: Arc<ClientHandlers>,
    state: Arc<AtomicU8>,
) {
    let (mut write, mut read) = ws_stream.split();

    let notice = loop {
        let deadline = session
            .lock()
            .await
            .as_ref()
            .and_then(ProtocolSession::poll_deadline);

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Disconnecting");
                if let Err(e) = write.send(Message::Close(None)).await {
                    tracing::debug!("Close frame not sent: {}", e);
                }
                break ConnectionNotice::Closed;
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    break ConnectionNotice::Closed;
                };
                if let Err(e) = write.send(Message::Binary(frame)).await {
                    tracing::error!("Failed to send frame: {}", e);
                    break ConnectionNotice::TransportError(e.into());
                }
            }
            inbound = read.next() => match inbound {
                Some(Ok(Message::Binary(data))) => {
                    let handled = match session.lock().await.as_mut() {
                        Some(s) => s.handle_frame(&data, Instant::now()),
                        None => Ok(Vec::new()),
                    };
                    match handled {
                        Ok(effects) => run_effects(effects, &handlers),
                        Err(e) => {
                            tracing::warn!("Undecodable frame: {}", e);
                            handlers.close(ConnectionNotice::ProtocolError(e));
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Server closed connection");
                    break ConnectionNotice::Closed;
                }
                Some(Ok(Message::Text(text))) => {
                    tracing::warn!(len = text.len(), "Ignoring text frame");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("WebSocket error: {}", e);
                    break ConnectionNotice::TransportError(e.into());
                }
                None => {
                    tracing::info!("Connection stream ended");
                    break ConnectionNotice::Closed;
                }
            },
            _ = stall_timer(deadline) => {
                if let Some(s) = session.lock().await.as_mut() {
                    s.check_stall(Instant::now());
                }
            }
        }
    };

    let rejected = match session.lock().await.as_mut() {
        Some(s) => s.teardown(),
        None => Vec::new(),
    };
    if !rejected.is_empty() {
        tracing::debug!("Rejecting {} pending commands", rejected.len());
    }
    for callback in rejected {
        callback(Err(ClientError::ConnectionClosed));
    }

    if let Some(terminal) = notice.terminal_state() {
        set_connection_state(&state, terminal);
    }
    handlers.close(notice);
}

fn run_effects(effects: Vec<SessionEffect>, handlers: &ClientHandlers) {
    for effect in effects {
        match effect {
            SessionEffect::Resolved { callback, result } => callback(Ok(result)),
            SessionEffect::Failed { callback, error } => callback(Err(error)),
            SessionEffect::StateUpdated(update) => handlers.state_update(update),
            SessionEffect::ServerError(e) => {
                tracing::warn!("Server rejected a command: {}", e);
                handlers.close(ConnectionNotice::ProtocolError(e));
            }
        }
    }
}
