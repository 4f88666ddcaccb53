//! Normalized in-memory cache of boards and their tasks.
//!
//! [`EntityStore`] holds the data and is purely synchronous: every operation is total and reports
//! whether it changed anything. [`SharedStore`] is the handle the rest of the engine passes
//! around. It serializes access, runs each mutation inside a closure that cannot await, and
//! turns every effective change into a [`BoardEvent`].

use std::sync::Arc;
use taskboard_core::models::{Board, Column, Task};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::events::{BoardEvent, EventDispatcher};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityStore {
    boards: Vec<Board>,
    active_board: Option<Uuid>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boards(&self) -> &[Board] {
        &self.boards
    }

    pub fn board(&self, board_id: &Uuid) -> Option<&Board> {
        self.boards.iter().find(|b| b.id == *board_id)
    }

    fn board_mut(&mut self, board_id: &Uuid) -> Option<&mut Board> {
        self.boards.iter_mut().find(|b| b.id == *board_id)
    }

    pub fn contains_board(&self, board_id: &Uuid) -> bool {
        self.board(board_id).is_some()
    }

    /// Tasks of a board in render order; empty when the board is not cached.
    pub fn tasks(&self, board_id: &Uuid) -> &[Task] {
        self.board(board_id).map(|b| b.tasks.as_slice()).unwrap_or(&[])
    }

    pub fn task(&self, board_id: &Uuid, task_id: &Uuid) -> Option<&Task> {
        self.board(board_id).and_then(|b| b.task(task_id))
    }

    /// Tasks of a board that sit in `column`, in list order.
    pub fn tasks_in_column(&self, board_id: &Uuid, column: &Column) -> Vec<&Task> {
        self.tasks(board_id)
            .iter()
            .filter(|t| column.holds(t))
            .collect()
    }

    pub fn active_board(&self) -> Option<Uuid> {
        self.active_board
    }

    pub fn set_active_board(&mut self, board_id: Option<Uuid>) -> bool {
        if self.active_board == board_id {
            return false;
        }
        self.active_board = board_id;
        true
    }

    /// Replace the whole board list, as returned by `GET /boards`.
    ///
    /// List responses carry no tasks, so boards that stay in the list keep their cached tasks.
    pub fn set_boards(&mut self, mut boards: Vec<Board>) -> bool {
        for board in boards.iter_mut().filter(|b| b.tasks.is_empty()) {
            if let Some(cached) = self.board(&board.id) {
                board.tasks = cached.tasks.clone();
            }
        }
        if self.boards == boards {
            return false;
        }
        self.boards = boards;
        if let Some(active) = self.active_board {
            if !self.contains_board(&active) {
                self.active_board = None;
            }
        }
        true
    }

    /// Update board metadata in place, keeping cached tasks, or append a new board.
    pub fn upsert_board(&mut self, board: Board) -> bool {
        match self.board_mut(&board.id) {
            Some(existing) => {
                let mut merged = board;
                merged.tasks = existing.tasks.clone();
                if *existing == merged {
                    return false;
                }
                *existing = merged;
                true
            }
            None => {
                self.boards.push(board);
                true
            }
        }
    }

    /// Full replace after an authoritative fetch. Appends when the board is not cached yet.
    pub fn replace_board(&mut self, board: Board) -> bool {
        match self.board_mut(&board.id) {
            Some(existing) if *existing == board => false,
            Some(existing) => {
                *existing = board;
                true
            }
            None => {
                self.boards.push(board);
                true
            }
        }
    }

    /// Remove a board and, with it, all of its tasks.
    pub fn remove_board(&mut self, board_id: &Uuid) -> bool {
        let before = self.boards.len();
        self.boards.retain(|b| b.id != *board_id);
        if self.active_board == Some(*board_id) {
            self.active_board = None;
        }
        self.boards.len() != before
    }

    /// Overwrite a task in place or append it. No-op when the board is not cached.
    pub fn upsert_task(&mut self, board_id: &Uuid, task: Task) -> bool {
        let Some(board) = self.board_mut(board_id) else {
            return false;
        };
        match board.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) if *existing == task => false,
            Some(existing) => {
                *existing = task;
                true
            }
            None => {
                board.tasks.push(task);
                true
            }
        }
    }

    pub fn remove_task(&mut self, board_id: &Uuid, task_id: &Uuid) -> bool {
        let Some(board) = self.board_mut(board_id) else {
            return false;
        };
        let before = board.tasks.len();
        board.tasks.retain(|t| t.id != *task_id);
        board.tasks.len() != before
    }
}

/// Cloneable handle to the engine's single [`EntityStore`].
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<EntityStore>>,
    events: Arc<EventDispatcher>,
}

impl SharedStore {
    pub fn new(events: Arc<EventDispatcher>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EntityStore::new())),
            events,
        }
    }

    pub fn events(&self) -> Arc<EventDispatcher> {
        self.events.clone()
    }

    /// Run a read-only query against the store.
    pub async fn read<R>(&self, f: impl FnOnce(&EntityStore) -> R) -> R {
        let store = self.inner.lock().await;
        f(&store)
    }

    pub async fn snapshot(&self) -> EntityStore {
        self.read(|s| s.clone()).await
    }

    pub async fn board(&self, board_id: Uuid) -> Option<Board> {
        self.read(|s| s.board(&board_id).cloned()).await
    }

    pub async fn tasks(&self, board_id: Uuid) -> Vec<Task> {
        self.read(|s| s.tasks(&board_id).to_vec()).await
    }

    pub async fn task(&self, board_id: Uuid, task_id: Uuid) -> Option<Task> {
        self.read(|s| s.task(&board_id, &task_id).cloned()).await
    }

    pub async fn active_board(&self) -> Option<Uuid> {
        self.read(|s| s.active_board()).await
    }

    pub async fn set_active_board(&self, board_id: Option<Uuid>) -> bool {
        let changed = self.inner.lock().await.set_active_board(board_id);
        if changed {
            self.events.emit(BoardEvent::ActiveBoardChanged { board_id });
        }
        changed
    }

    pub async fn set_boards(&self, boards: Vec<Board>) -> bool {
        let count = boards.len();
        let changed = self.inner.lock().await.set_boards(boards);
        if changed {
            self.events.emit(BoardEvent::BoardsLoaded { count });
        }
        changed
    }

    pub async fn upsert_board(&self, board: Board) -> bool {
        let (board_id, name) = (board.id, board.name.clone());
        let changed = self.inner.lock().await.upsert_board(board);
        if changed {
            self.events.emit(BoardEvent::BoardUpserted { board_id, name });
        }
        changed
    }

    /// Replace (or insert) a board from an authoritative fetch.
    pub async fn load_board(&self, board: Board) -> bool {
        let (board_id, task_count) = (board.id, board.tasks.len());
        let changed = self.inner.lock().await.replace_board(board);
        if changed {
            self.events.emit(BoardEvent::BoardRefreshed {
                board_id,
                task_count,
            });
        }
        changed
    }

    /// Like [`SharedStore::load_board`], but a board that left the store stays gone.
    pub async fn refresh_board(&self, board: Board) -> bool {
        let (board_id, task_count) = (board.id, board.tasks.len());
        let changed = {
            let mut store = self.inner.lock().await;
            if !store.contains_board(&board_id) {
                tracing::debug!("STORE: Ignoring refresh for uncached board {}", board_id);
                return false;
            }
            store.replace_board(board)
        };
        if changed {
            self.events.emit(BoardEvent::BoardRefreshed {
                board_id,
                task_count,
            });
        }
        changed
    }

    pub async fn remove_board(&self, board_id: Uuid) -> bool {
        let (changed, was_active) = {
            let mut store = self.inner.lock().await;
            let was_active = store.active_board() == Some(board_id);
            (store.remove_board(&board_id), was_active)
        };
        if changed {
            self.events.emit(BoardEvent::BoardRemoved { board_id });
        }
        if was_active {
            self.events
                .emit(BoardEvent::ActiveBoardChanged { board_id: None });
        }
        changed
    }

    pub async fn upsert_task(&self, board_id: Uuid, task: Task) -> bool {
        let (task_id, status) = (task.id, task.status.clone());
        let changed = self.inner.lock().await.upsert_task(&board_id, task);
        if changed {
            self.events.emit(BoardEvent::TaskUpserted {
                board_id,
                task_id,
                status,
            });
        }
        changed
    }

    pub async fn remove_task(&self, board_id: Uuid, task_id: Uuid) -> bool {
        let changed = self.inner.lock().await.remove_task(&board_id, &task_id);
        if changed {
            self.events
                .emit(BoardEvent::TaskRemoved { board_id, task_id });
        }
        changed
    }
}
