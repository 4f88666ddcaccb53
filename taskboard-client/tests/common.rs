use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use taskboard_client::push::{PushConnection, PushTransport};
use taskboard_client::SharedStore;
use taskboard_client::BoardApi;
use taskboard_core::models::{
    AuthResponse, Board, Column, LoginRequest, NewBoard, NewColumn, NewTask, RegisterRequest, Task,
    TaskPatch, User,
    DEFAULT_TASK_STATUS,
};
use taskboard_core::{SyncError, SyncResult};
use tokio::sync::mpsc;
use uuid::Uuid;

#[allow(dead_code)]
pub fn make_board(name: &str) -> Board {
    Board {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        user_id: None,
        tasks: Vec::new(),
        created_at: None,
        updated_at: None,
    }
}

#[allow(dead_code)]
pub fn make_task(board_id: Uuid, title: &str, status: &str) -> Task {
    Task {
        id: Uuid::new_v4(),
        board_id,
        title: title.to_string(),
        description: String::new(),
        status: status.to_string(),
        priority: None,
        assignee: None,
        created_by: None,
        created_at: None,
        updated_at: None,
    }
}

#[allow(dead_code)]
pub fn make_column(board_id: Uuid, title: &str, status_id: &str, position: i32) -> Column {
    Column {
        id: Uuid::new_v4(),
        board_id,
        title: title.to_string(),
        status_id: status_id.to_string(),
        position,
    }
}

/// A push frame as the server would broadcast it.
#[allow(dead_code)]
pub fn task_frame(kind: &str, board_id: Uuid, task: &Task) -> String {
    json!({ "type": kind, "board_id": board_id, "data": task }).to_string()
}

#[allow(dead_code)]
pub fn deleted_frame(board_id: Uuid, task_id: Uuid) -> String {
    json!({ "type": "task_deleted", "board_id": board_id, "data": { "id": task_id } }).to_string()
}

/// Poll the store until `check` holds. Panics after two seconds.
#[allow(dead_code)]
pub async fn wait_until<F>(store: &SharedStore, check: F)
where
    F: Fn(&taskboard_client::EntityStore) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if check(&store.snapshot().await) {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for store condition");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// In-memory board service
// =============================================================================

#[derive(Default)]
struct ServerState {
    boards: Vec<Board>,
    columns: Vec<Column>,
    users: Vec<User>,
    calls: Vec<String>,
    fail_next: Option<SyncError>,
    failing: HashMap<String, SyncError>,
}

/// Board service stand-in. Keeps authoritative state, records every call and can be told to fail.
#[derive(Default)]
pub struct MockApi {
    state: Mutex<ServerState>,
}

#[allow(dead_code)]
impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_board(self, board: Board) -> Self {
        self.state.lock().unwrap().boards.push(board);
        self
    }

    pub fn with_column(self, column: Column) -> Self {
        self.state.lock().unwrap().columns.push(column);
        self
    }

    /// Change server state behind the client's back, as another client would.
    pub fn server_upsert_task(&self, board_id: Uuid, task: Task) {
        let mut state = self.state.lock().unwrap();
        let board = state.boards.iter_mut().find(|b| b.id == board_id).unwrap();
        match board.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => board.tasks.push(task),
        }
    }

    pub fn server_remove_task(&self, board_id: Uuid, task_id: Uuid) {
        let mut state = self.state.lock().unwrap();
        if let Some(board) = state.boards.iter_mut().find(|b| b.id == board_id) {
            board.tasks.retain(|t| t.id != task_id);
        }
    }

    pub fn server_board(&self, board_id: Uuid) -> Option<Board> {
        let state = self.state.lock().unwrap();
        state.boards.iter().find(|b| b.id == board_id).cloned()
    }

    pub fn fail_next(&self, err: SyncError) {
        self.state.lock().unwrap().fail_next = Some(err);
    }

    /// Make every call to `method` fail until cleared.
    pub fn fail_method(&self, method: &str, err: SyncError) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(method.to_string(), err);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_next = None;
        state.failing.clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == method).count()
    }

    /// Wait until `method` has been called at least `count` times. Panics after two seconds.
    pub async fn wait_for_calls(&self, method: &str, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while self.call_count(method) < count {
            if tokio::time::Instant::now() > deadline {
                panic!("Timed out waiting for {} call(s) to {}", count, method);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn begin(&self, method: &str) -> SyncResult<std::sync::MutexGuard<'_, ServerState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(method.to_string());
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        if let Some(err) = state.failing.get(method) {
            return Err(err.clone());
        }
        Ok(state)
    }
}

fn not_found(what: &str) -> SyncError {
    SyncError::request(404, format!("{} not found", what))
}

impl BoardApi for MockApi {
    async fn list_boards(&self) -> SyncResult<Vec<Board>> {
        let state = self.begin("list_boards")?;
        Ok(state
            .boards
            .iter()
            .map(|b| Board {
                tasks: Vec::new(),
                ..b.clone()
            })
            .collect())
    }

    async fn get_board(&self, board_id: Uuid) -> SyncResult<Board> {
        let state = self.begin("get_board")?;
        state
            .boards
            .iter()
            .find(|b| b.id == board_id)
            .cloned()
            .ok_or_else(|| not_found("board"))
    }

    async fn create_board(&self, board: &NewBoard) -> SyncResult<Board> {
        let mut state = self.begin("create_board")?;
        let created = Board {
            description: board.description.clone(),
            ..make_board(&board.name)
        };
        state.boards.push(created.clone());
        Ok(created)
    }

    async fn update_board(&self, board_id: Uuid, board: &NewBoard) -> SyncResult<Board> {
        let mut state = self.begin("update_board")?;
        let existing = state
            .boards
            .iter_mut()
            .find(|b| b.id == board_id)
            .ok_or_else(|| not_found("board"))?;
        existing.name = board.name.clone();
        existing.description = board.description.clone();
        Ok(Board {
            tasks: Vec::new(),
            ..existing.clone()
        })
    }

    async fn delete_board(&self, board_id: Uuid) -> SyncResult<()> {
        let mut state = self.begin("delete_board")?;
        let before = state.boards.len();
        state.boards.retain(|b| b.id != board_id);
        if state.boards.len() == before {
            return Err(not_found("board"));
        }
        state.columns.retain(|c| c.board_id != board_id);
        Ok(())
    }

    async fn list_tasks(&self, board_id: Uuid) -> SyncResult<Vec<Task>> {
        let state = self.begin("list_tasks")?;
        state
            .boards
            .iter()
            .find(|b| b.id == board_id)
            .map(|b| b.tasks.clone())
            .ok_or_else(|| not_found("board"))
    }

    async fn get_task(&self, task_id: Uuid) -> SyncResult<Task> {
        let state = self.begin("get_task")?;
        state
            .boards
            .iter()
            .flat_map(|b| b.tasks.iter())
            .find(|t| t.id == task_id)
            .cloned()
            .ok_or_else(|| not_found("task"))
    }

    async fn create_task(&self, task: &NewTask) -> SyncResult<Task> {
        let mut state = self.begin("create_task")?;
        let board = state
            .boards
            .iter_mut()
            .find(|b| b.id == task.board_id)
            .ok_or_else(|| not_found("board"))?;
        let status = task.status.as_deref().unwrap_or(DEFAULT_TASK_STATUS);
        let created = Task {
            description: task.description.clone(),
            priority: task.priority,
            assignee: task.assignee.clone(),
            ..make_task(task.board_id, &task.title, status)
        };
        board.tasks.push(created.clone());
        Ok(created)
    }

    async fn update_task(&self, task_id: Uuid, patch: &TaskPatch) -> SyncResult<Task> {
        let mut state = self.begin("update_task")?;
        let task = state
            .boards
            .iter_mut()
            .flat_map(|b| b.tasks.iter_mut())
            .find(|t| t.id == task_id)
            .ok_or_else(|| not_found("task"))?;
        patch.apply_to(task);
        Ok(task.clone())
    }

    async fn move_task(&self, task_id: Uuid, status: &str) -> SyncResult<Task> {
        let mut state = self.begin("move_task")?;
        let task = state
            .boards
            .iter_mut()
            .flat_map(|b| b.tasks.iter_mut())
            .find(|t| t.id == task_id)
            .ok_or_else(|| not_found("task"))?;
        task.status = status.to_string();
        Ok(task.clone())
    }

    async fn delete_task(&self, task_id: Uuid) -> SyncResult<()> {
        let mut state = self.begin("delete_task")?;
        let mut found = false;
        for board in state.boards.iter_mut() {
            let before = board.tasks.len();
            board.tasks.retain(|t| t.id != task_id);
            found |= board.tasks.len() != before;
        }
        if !found {
            return Err(not_found("task"));
        }
        Ok(())
    }

    async fn list_columns(&self, board_id: Uuid) -> SyncResult<Vec<Column>> {
        let state = self.begin("list_columns")?;
        Ok(state
            .columns
            .iter()
            .filter(|c| c.board_id == board_id)
            .cloned()
            .collect())
    }

    async fn create_column(&self, column: &NewColumn) -> SyncResult<Column> {
        let mut state = self.begin("create_column")?;
        let created = make_column(
            column.board_id,
            &column.title,
            &column.status_id,
            column.position,
        );
        state.columns.push(created.clone());
        Ok(created)
    }

    async fn delete_column(&self, column_id: Uuid) -> SyncResult<()> {
        let mut state = self.begin("delete_column")?;
        state.columns.retain(|c| c.id != column_id);
        Ok(())
    }

    async fn login(&self, credentials: &LoginRequest) -> SyncResult<AuthResponse> {
        credentials.validate()?;
        let _state = self.begin("login")?;
        Ok(AuthResponse {
            token: format!("token-{}", credentials.username),
            user: User {
                id: Uuid::new_v4(),
                username: credentials.username.clone(),
                email: format!("{}@example.com", credentials.username),
                created_at: None,
                updated_at: None,
            },
        })
    }

    async fn register(&self, request: &RegisterRequest) -> SyncResult<AuthResponse> {
        request.validate()?;
        let mut state = self.begin("register")?;
        if state.users.iter().any(|u| u.username == request.username) {
            return Err(SyncError::request(409, "Username already exists"));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: request.username.clone(),
            email: request.email.clone(),
            created_at: None,
            updated_at: None,
        };
        state.users.push(user.clone());
        Ok(AuthResponse {
            token: format!("token-{}", user.username),
            user,
        })
    }

    async fn current_user(&self) -> SyncResult<User> {
        let _state = self.begin("current_user")?;
        Err(SyncError::request(401, "Unauthorized"))
    }
}

// =============================================================================
// Scripted push transport
// =============================================================================

#[derive(Default)]
struct TransportState {
    attempts: Vec<String>,
    refuse: bool,
    live: Option<mpsc::UnboundedSender<String>>,
}

/// Push transport driven by the test: frames are injected with [`MockTransport::send`] and the
/// connection is dropped with [`MockTransport::close`].
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<TransportState>,
}

pub struct MockConnection {
    rx: mpsc::UnboundedReceiver<String>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make connect attempts fail (or succeed again).
    pub fn refuse(&self, refuse: bool) {
        self.state.lock().unwrap().refuse = refuse;
    }

    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts.len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.state.lock().unwrap().attempts.clone()
    }

    pub fn send(&self, frame: impl Into<String>) {
        let state = self.state.lock().unwrap();
        state
            .live
            .as_ref()
            .expect("no open connection")
            .send(frame.into())
            .unwrap();
    }

    /// Close the current connection from the server side.
    pub fn close(&self) {
        self.state.lock().unwrap().live = None;
    }
}

impl PushTransport for MockTransport {
    type Connection = MockConnection;

    async fn connect(&self, url: &str) -> SyncResult<MockConnection> {
        let mut state = self.state.lock().unwrap();
        state.attempts.push(url.to_string());
        if state.refuse {
            return Err(SyncError::Transport("connection refused".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.live = Some(tx);
        Ok(MockConnection { rx })
    }
}

impl PushConnection for MockConnection {
    async fn next_frame(&mut self) -> Option<SyncResult<String>> {
        self.rx.recv().await.map(Ok)
    }
}
