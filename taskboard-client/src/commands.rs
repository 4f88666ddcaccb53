//! Typed mutations against the board service.
//!
//! Every command runs the same three steps: validate locally, issue the remote call, then apply
//! the server's canonical answer to the store. The store is only touched after the server has
//! confirmed, so a failed command leaves it exactly as it was. Successful commands finish with a
//! full re-fetch of the affected board so concurrent edits from other clients converge.

use std::sync::Arc;
use taskboard_core::models::{require_non_empty, Board, NewBoard, NewTask, Task, TaskPatch};
use taskboard_core::{SyncError, SyncResult};
use uuid::Uuid;

use crate::api::BoardApi;
use crate::store::SharedStore;

pub struct CommandLayer<A: BoardApi> {
    api: Arc<A>,
    store: SharedStore,
}

impl<A: BoardApi> Clone for CommandLayer<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            store: self.store.clone(),
        }
    }
}

impl<A: BoardApi> CommandLayer<A> {
    pub fn new(api: Arc<A>, store: SharedStore) -> Self {
        Self { api, store }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn load_boards(&self) -> SyncResult<Vec<Board>> {
        let boards = self.api.list_boards().await?;
        tracing::info!("COMMAND: Loaded {} boards", boards.len());
        self.store.set_boards(boards.clone()).await;
        Ok(boards)
    }

    /// Fetch a board with its tasks and cache it, inserting it if needed.
    pub async fn load_board(&self, board_id: Uuid) -> SyncResult<Board> {
        let board = self.api.get_board(board_id).await?;
        self.store.load_board(board.clone()).await;
        Ok(board)
    }

    /// Re-fetch a cached board. A board that has left the store is not brought back.
    pub async fn refresh_board(&self, board_id: Uuid) -> SyncResult<()> {
        let board = self.api.get_board(board_id).await?;
        self.store.refresh_board(board).await;
        Ok(())
    }

    /// Tasks straight from the server. Not cached.
    pub async fn list_tasks(&self, board_id: Uuid) -> SyncResult<Vec<Task>> {
        self.api.list_tasks(board_id).await
    }

    /// One task straight from the server. Not cached.
    pub async fn get_task(&self, task_id: Uuid) -> SyncResult<Task> {
        self.api.get_task(task_id).await
    }

    // =========================================================================
    // Board commands
    // =========================================================================

    pub async fn create_board(&self, name: &str, description: Option<String>) -> SyncResult<Board> {
        let request = NewBoard::new(name.trim(), description);
        request.validate()?;

        let board = self.api.create_board(&request).await?;
        tracing::info!("COMMAND: Created board {} ({})", board.id, board.name);
        self.store.upsert_board(board.clone()).await;
        self.settle(board.id).await;
        Ok(board)
    }

    pub async fn update_board(
        &self,
        board_id: Uuid,
        name: &str,
        description: Option<String>,
    ) -> SyncResult<Board> {
        let request = NewBoard::new(name.trim(), description);
        request.validate()?;

        let board = self.api.update_board(board_id, &request).await?;
        tracing::info!("COMMAND: Updated board {}", board.id);
        self.store.upsert_board(board.clone()).await;
        self.settle(board.id).await;
        Ok(board)
    }

    /// Delete a board. Its tasks leave the store with it, and the active selection is cleared
    /// if it pointed at this board.
    pub async fn delete_board(&self, board_id: Uuid) -> SyncResult<()> {
        self.api.delete_board(board_id).await?;
        tracing::info!("COMMAND: Deleted board {}", board_id);
        self.store.remove_board(board_id).await;
        Ok(())
    }

    // =========================================================================
    // Task commands
    // =========================================================================

    /// Create a task. Without an explicit status it lands in the default `plan` lane.
    pub async fn create_task(&self, task: NewTask) -> SyncResult<Task> {
        task.validate()?;
        let request = task.normalized();

        let created = self.api.create_task(&request).await?;
        tracing::info!(
            "COMMAND: Created task {} on board {} in {}",
            created.id,
            request.board_id,
            created.status
        );
        self.store.upsert_task(request.board_id, created.clone()).await;
        self.settle(request.board_id).await;
        Ok(created)
    }

    pub async fn update_task(&self, board_id: Uuid, task_id: Uuid, patch: TaskPatch) -> SyncResult<Task> {
        if patch.is_empty() {
            return Err(SyncError::validation("task update has no fields"));
        }
        patch.validate()?;

        let updated = self.api.update_task(task_id, &patch).await?;
        tracing::info!("COMMAND: Updated task {} on board {}", task_id, board_id);
        self.store.upsert_task(board_id, updated.clone()).await;
        self.settle(board_id).await;
        Ok(updated)
    }

    /// Move a task to another lane. Only its status changes.
    pub async fn move_task(&self, task_id: Uuid, new_status: &str, board_id: Uuid) -> SyncResult<Task> {
        require_non_empty("target status", new_status)?;

        let moved = self.api.move_task(task_id, new_status).await?;
        tracing::info!(
            "COMMAND: Moved task {} to {} on board {}",
            task_id,
            moved.status,
            board_id
        );
        self.store.upsert_task(board_id, moved.clone()).await;
        self.settle(board_id).await;
        Ok(moved)
    }

    pub async fn delete_task(&self, task_id: Uuid, board_id: Uuid) -> SyncResult<()> {
        self.api.delete_task(task_id).await?;
        tracing::info!("COMMAND: Deleted task {} from board {}", task_id, board_id);
        self.store.remove_task(board_id, task_id).await;
        self.settle(board_id).await;
        Ok(())
    }

    /// Follow-up refresh after a successful command. The command already succeeded, so a failed
    /// refresh is only logged.
    async fn settle(&self, board_id: Uuid) {
        if let Err(e) = self.refresh_board(board_id).await {
            tracing::error!("COMMAND: Refresh of board {} failed: {}", board_id, e);
            self.store
                .events()
                .emit_sync_error(&format!("Refresh of board {} failed: {}", board_id, e));
        }
    }
}
