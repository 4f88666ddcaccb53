//! Live updates for the boards being viewed.
//!
//! Each watched board gets one [`PushChannel`]: a background task that keeps a receive-only
//! connection to `/ws/board/{id}` open and walks this state machine:
//!
//! ```text
//!   Connecting ──handshake ok──▶ Open
//!       ▲                          │ closed / error
//!       │                          ▼
//!       └──── fixed delay ──── Reconnecting ◀── connect failed
//! ```
//!
//! Every applied frame is followed by a full refresh of the board, so duplicated or reordered
//! delivery converges without sequence numbers. Dropping the channel cancels the task, including
//! a pending retry.

use futures_util::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use strum::Display;
use taskboard_core::protocol::{PushEvent, PushMessage};
use taskboard_core::{SyncError, SyncResult};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::api::BoardApi;
use crate::config::{ClientConfig, MIN_RECONNECT_DELAY};
use crate::errors::ClientError;
use crate::store::SharedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting,
}

// =============================================================================
// Transport
// =============================================================================

/// Opens push connections. Implemented over WebSockets by [`WsTransport`].
pub trait PushTransport: Send + Sync + 'static {
    type Connection: PushConnection;

    fn connect(&self, url: &str) -> impl Future<Output = SyncResult<Self::Connection>> + Send;
}

pub trait PushConnection: Send + 'static {
    /// Next inbound text frame. `None` once the connection is closed.
    fn next_frame(&mut self) -> impl Future<Output = Option<SyncResult<String>>> + Send;
}

#[derive(Debug, Clone, Default)]
pub struct WsTransport;

pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PushTransport for WsTransport {
    type Connection = WsConnection;

    async fn connect(&self, url: &str) -> SyncResult<WsConnection> {
        let (stream, _) = connect_async(url).await.map_err(ClientError::from)?;
        Ok(WsConnection { stream })
    }
}

impl PushConnection for WsConnection {
    async fn next_frame(&mut self) -> Option<SyncResult<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                // Pings are answered by tungstenite; nothing else carries events
                Ok(_) => continue,
                Err(e) => return Some(Err(ClientError::from(e).into())),
            }
        }
    }
}

// =============================================================================
// Frame application
// =============================================================================

/// Outcome of applying one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// The event was applied; the board should now be refreshed.
    Refresh(Uuid),
    /// Unknown event type, dropped.
    Ignored,
}

/// Parse a frame and apply it to the store.
///
/// Upserts and removes are idempotent, so redelivering a frame is harmless. Frames without a
/// `board_id` are applied to `fallback_board`, the board the channel was opened for.
pub async fn apply_frame(store: &SharedStore, fallback_board: Uuid, frame: &str) -> SyncResult<Applied> {
    let message = PushMessage::parse(frame)?;
    let board_id = message.board_id.unwrap_or(fallback_board);

    match message.event {
        PushEvent::TaskCreated(task) | PushEvent::TaskUpdated(task) | PushEvent::TaskMoved(task) => {
            store.upsert_task(board_id, task).await;
        }
        PushEvent::TaskDeleted { task_id } => {
            store.remove_task(board_id, task_id).await;
        }
        PushEvent::Unknown { kind } => {
            tracing::info!("PUSH: Unknown event type '{}' on board {}, ignoring", kind, board_id);
            return Ok(Applied::Ignored);
        }
    }

    Ok(Applied::Refresh(board_id))
}

// =============================================================================
// Channel
// =============================================================================

/// Handle to one board's push connection. Dropping it tears the connection down.
pub struct PushChannel {
    board_id: Uuid,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PushChannel {
    pub fn spawn<A, T>(
        board_id: Uuid,
        config: &ClientConfig,
        api: Arc<A>,
        transport: Arc<T>,
        store: SharedStore,
    ) -> Self
    where
        A: BoardApi,
        T: PushTransport,
    {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = ChannelWorker {
            board_id,
            url: config.push_url(&board_id),
            reconnect_delay: config.reconnect_delay,
            api,
            transport,
            store,
            state_tx,
            shutdown_rx,
        };
        let task = tokio::spawn(worker.run());

        Self {
            board_id,
            state_rx,
            shutdown_tx,
            task,
        }
    }

    pub fn board_id(&self) -> Uuid {
        self.board_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch state transitions, e.g. to wait for `Open`.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        tracing::info!("PUSH: Tearing down channel for board {}", self.board_id);
        let _ = self.shutdown_tx.send(true);
        self.task.abort();
    }
}

struct ChannelWorker<A, T> {
    board_id: Uuid,
    url: String,
    reconnect_delay: Duration,
    api: Arc<A>,
    transport: Arc<T>,
    store: SharedStore,
    state_tx: watch::Sender<ConnectionState>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<A: BoardApi, T: PushTransport> ChannelWorker<A, T> {
    async fn run(mut self) {
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);
            self.set_state(ConnectionState::Connecting);
            tracing::info!(
                "PUSH: Connection attempt #{} for board {} to {}",
                attempts,
                self.board_id,
                self.url
            );

            let connected = tokio::select! {
                result = self.transport.connect(&self.url) => result,
                _ = self.shutdown_rx.changed() => return,
            };

            match connected {
                Ok(mut connection) => {
                    attempts = 0;
                    self.set_state(ConnectionState::Open);
                    tracing::info!("PUSH: Connected for board {}", self.board_id);
                    if self.pump(&mut connection).await.is_break() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!("PUSH: Connect failed for board {}: {}", self.board_id, e);
                    self.store
                        .events()
                        .emit_sync_error(&format!("Push connection failed: {}", e));
                }
            }

            self.set_state(ConnectionState::Reconnecting);
            tracing::info!(
                "PUSH: Reconnecting board {} in {}ms",
                self.board_id,
                self.reconnect_delay.as_millis()
            );
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay.max(MIN_RECONNECT_DELAY)) => {}
                _ = self.shutdown_rx.changed() => return,
            }
        }
    }

    /// Read frames until the connection ends. `Break` means shutdown was requested.
    async fn pump(&mut self, connection: &mut T::Connection) -> std::ops::ControlFlow<()> {
        use std::ops::ControlFlow;

        loop {
            let frame = tokio::select! {
                frame = connection.next_frame() => frame,
                _ = self.shutdown_rx.changed() => return ControlFlow::Break(()),
            };

            match frame {
                Some(Ok(text)) => self.handle_frame(&text).await,
                Some(Err(e)) => {
                    tracing::warn!("PUSH: Transport error on board {}: {}", self.board_id, e);
                    return ControlFlow::Continue(());
                }
                None => {
                    tracing::info!("PUSH: Connection closed for board {}", self.board_id);
                    return ControlFlow::Continue(());
                }
            }
        }
    }

    async fn handle_frame(&self, frame: &str) {
        match apply_frame(&self.store, self.board_id, frame).await {
            Ok(Applied::Refresh(board_id)) => self.refresh(board_id).await,
            Ok(Applied::Ignored) => {}
            Err(e) => {
                tracing::warn!("PUSH: Dropping malformed frame on board {}: {}", self.board_id, e);
            }
        }
    }

    async fn refresh(&self, board_id: Uuid) {
        match self.api.get_board(board_id).await {
            Ok(board) => {
                self.store.refresh_board(board).await;
            }
            Err(e) => {
                tracing::error!("PUSH: Refresh of board {} failed: {}", board_id, e);
                self.store
                    .events()
                    .emit_sync_error(&format!("Refresh of board {} failed: {}", board_id, e));
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            self.store.events().emit_connection_state(self.board_id, state);
        }
    }
}

// =============================================================================
// Manager
// =============================================================================

/// Registry of push channels, one per watched board.
pub struct PushChannelManager<A: BoardApi, T: PushTransport> {
    config: ClientConfig,
    api: Arc<A>,
    transport: Arc<T>,
    store: SharedStore,
    channels: HashMap<Uuid, PushChannel>,
}

impl<A: BoardApi, T: PushTransport> PushChannelManager<A, T> {
    pub fn new(config: ClientConfig, api: Arc<A>, transport: Arc<T>, store: SharedStore) -> Self {
        Self {
            config,
            api,
            transport,
            store,
            channels: HashMap::new(),
        }
    }

    /// Start watching a board. Watching an already-watched board is a no-op.
    pub fn watch(&mut self, board_id: Uuid) {
        if self.channels.contains_key(&board_id) {
            tracing::debug!("PUSH: Board {} already watched", board_id);
            return;
        }
        let channel = PushChannel::spawn(
            board_id,
            &self.config,
            self.api.clone(),
            self.transport.clone(),
            self.store.clone(),
        );
        self.channels.insert(board_id, channel);
    }

    pub fn unwatch(&mut self, board_id: Uuid) -> bool {
        self.channels.remove(&board_id).is_some()
    }

    /// Make `board_id` the only watched board, or watch nothing.
    pub fn switch_to(&mut self, board_id: Option<Uuid>) {
        self.channels.retain(|id, _| Some(*id) == board_id);
        if let Some(board_id) = board_id {
            self.watch(board_id);
        }
    }

    pub fn channel(&self, board_id: Uuid) -> Option<&PushChannel> {
        self.channels.get(&board_id)
    }

    pub fn state(&self, board_id: Uuid) -> Option<ConnectionState> {
        self.channels.get(&board_id).map(|c| c.state())
    }

    pub fn watched(&self) -> Vec<Uuid> {
        self.channels.keys().copied().collect()
    }

    pub fn shutdown(&mut self) {
        self.channels.clear();
    }
}

/// Wait until a channel reports `target`, or fail after `timeout`.
pub async fn wait_for_state(
    rx: &mut watch::Receiver<ConnectionState>,
    target: ConnectionState,
    timeout: Duration,
) -> SyncResult<()> {
    tokio::time::timeout(timeout, rx.wait_for(|state| *state == target))
        .await
        .map_err(|_| SyncError::Transport(format!("timed out waiting for {}", target)))?
        .map_err(|_| SyncError::Transport("push channel stopped".to_string()))?;
    Ok(())
}
