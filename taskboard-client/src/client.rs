//! Entry point tying the pieces together.
//!
//! [`SyncEngine`] owns the store, the REST client, the command layer and the push channel
//! registry. Opening a board loads it, makes it the active board and moves the push channel to it;
//! the returned [`BoardSession`] carries the per-board state (columns, drag gesture).

use std::sync::{Arc, Mutex, MutexGuard};
use taskboard_core::models::{Board, Column, LoginRequest, NewTask, RegisterRequest, Task, User};
use taskboard_core::{SyncError, SyncResult};
use uuid::Uuid;

use crate::api::{BoardApi, HttpApi, Session};
use crate::columns::ColumnBoard;
use crate::commands::CommandLayer;
use crate::config::ClientConfig;
use crate::drag::{DragMoveController, DropOutcome};
use crate::errors::ClientError;
use crate::events::EventDispatcher;
use crate::push::{ConnectionState, PushChannelManager, PushTransport, WsTransport};
use crate::store::SharedStore;

pub struct SyncEngine<A: BoardApi = HttpApi, T: PushTransport = WsTransport> {
    config: ClientConfig,
    api: Arc<A>,
    store: SharedStore,
    events: Arc<EventDispatcher>,
    commands: CommandLayer<A>,
    push: Mutex<PushChannelManager<A, T>>,
}

impl SyncEngine<HttpApi, WsTransport> {
    /// Engine talking to a live board service.
    pub fn connect(config: ClientConfig) -> SyncResult<Self> {
        let api = Arc::new(HttpApi::new(config.clone())?);
        tracing::info!(
            "CLIENT: Using API {} and push endpoint {}",
            config.api_base_url,
            config.ws_base_url
        );
        Ok(Self::with_parts(config, api, Arc::new(WsTransport)))
    }

    pub async fn session(&self) -> Session {
        self.api.session().await
    }

    pub async fn logout(&self) {
        tracing::info!("CLIENT: Logging out");
        self.api.logout().await;
    }
}

impl<A: BoardApi, T: PushTransport> SyncEngine<A, T> {
    pub fn with_parts(config: ClientConfig, api: Arc<A>, transport: Arc<T>) -> Self {
        let events = Arc::new(EventDispatcher::new());
        let store = SharedStore::new(events.clone());
        let commands = CommandLayer::new(api.clone(), store.clone());
        let push = PushChannelManager::new(config.clone(), api.clone(), transport, store.clone());

        Self {
            config,
            api,
            store,
            events,
            commands,
            push: Mutex::new(push),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    pub fn commands(&self) -> &CommandLayer<A> {
        &self.commands
    }

    pub async fn login(&self, username: &str, password: &str) -> SyncResult<User> {
        let credentials = LoginRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        let auth = self.api.login(&credentials).await?;
        Ok(auth.user)
    }

    /// Create an account and log in as it.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> SyncResult<User> {
        let request = RegisterRequest {
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let auth = self.api.register(&request).await?;
        Ok(auth.user)
    }

    pub async fn current_user(&self) -> SyncResult<User> {
        self.api.current_user().await
    }

    pub async fn load_boards(&self) -> SyncResult<Vec<Board>> {
        self.commands.load_boards().await
    }

    /// Load a board, make it active and start receiving its live updates.
    ///
    /// Any previously watched board stops being watched.
    pub async fn open_board(&self, board_id: Uuid) -> SyncResult<BoardSession<A>> {
        self.commands.load_board(board_id).await?;
        let columns = ColumnBoard::load(self.api.clone(), board_id).await?;

        self.store.set_active_board(Some(board_id)).await;
        self.push_manager()?.switch_to(Some(board_id));
        tracing::info!(
            "CLIENT: Opened board {} with {} columns",
            board_id,
            columns.columns().len()
        );

        Ok(BoardSession {
            board_id,
            columns,
            drag: DragMoveController::new(),
            commands: self.commands.clone(),
        })
    }

    /// Stop watching and clear the active board.
    pub async fn close_board(&self) -> SyncResult<()> {
        self.push_manager()?.switch_to(None);
        self.store.set_active_board(None).await;
        Ok(())
    }

    pub fn push_state(&self, board_id: Uuid) -> SyncResult<Option<ConnectionState>> {
        Ok(self.push_manager()?.state(board_id))
    }

    pub fn watched_boards(&self) -> SyncResult<Vec<Uuid>> {
        Ok(self.push_manager()?.watched())
    }

    /// Tear down every push channel, cancelling pending retries.
    pub fn shutdown(&self) -> SyncResult<()> {
        tracing::info!("CLIENT: Shutting down push channels");
        self.push_manager()?.shutdown();
        Ok(())
    }

    fn push_manager(&self) -> SyncResult<MutexGuard<'_, PushChannelManager<A, T>>> {
        self.push
            .lock()
            .map_err(|_| SyncError::from(ClientError::LockError("push channels".into())))
    }
}

/// Per-board view state returned by [`SyncEngine::open_board`].
pub struct BoardSession<A: BoardApi> {
    board_id: Uuid,
    columns: ColumnBoard<A>,
    drag: DragMoveController,
    commands: CommandLayer<A>,
}

impl<A: BoardApi> BoardSession<A> {
    pub fn board_id(&self) -> Uuid {
        self.board_id
    }

    pub fn columns(&self) -> &[Column] {
        self.columns.columns()
    }

    pub fn column_board(&self) -> &ColumnBoard<A> {
        &self.columns
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.commands.store().tasks(self.board_id).await
    }

    /// Tasks rendered under a column. Unknown columns hold nothing.
    pub async fn tasks_in(&self, column_id: Uuid) -> Vec<Task> {
        match self.columns.column(column_id) {
            Some(column) => self.columns.tasks_in(column, self.commands.store()).await,
            None => Vec::new(),
        }
    }

    /// Create a task in the first column's lane.
    pub async fn create_task(&self, title: &str, description: &str) -> SyncResult<Task> {
        let task = NewTask::new(self.board_id, title.trim())
            .with_description(description)
            .with_status(self.columns.default_status());
        self.commands.create_task(task).await
    }

    pub async fn add_column(&mut self, title: &str) -> SyncResult<Column> {
        self.columns.add_column(title).await
    }

    pub async fn delete_column(&mut self, column_id: Uuid) -> SyncResult<()> {
        self.columns
            .delete_column(column_id, self.commands.store())
            .await
    }

    pub async fn reload_columns(&mut self) -> SyncResult<()> {
        self.columns.reload().await
    }

    pub async fn drag_start(&mut self, task_id: Uuid) {
        let tasks = self.tasks().await;
        self.drag.drag_start(&tasks, task_id);
    }

    pub fn lifted(&self) -> Option<&Task> {
        self.drag.lifted()
    }

    /// Abandon the current gesture without moving anything.
    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
    }

    pub async fn drag_end(&mut self, target_column: Option<Uuid>) -> SyncResult<DropOutcome> {
        self.drag
            .drag_end(target_column, &self.columns, &self.commands)
            .await
    }
}
