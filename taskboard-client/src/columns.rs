//! Lanes of a board.
//!
//! A column owns a `status_id`; a task belongs to the column whose `status_id` equals its
//! `status`. The relation is resolved at query time by [`ColumnBoard::tasks_in`], so columns and
//! tasks can be loaded and changed independently.

use std::sync::Arc;
use taskboard_core::models::{require_non_empty, Column, NewColumn, Task, DEFAULT_TASK_STATUS};
use taskboard_core::{SyncError, SyncResult};
use uuid::Uuid;

use crate::api::BoardApi;
use crate::store::SharedStore;

const STATUS_SUFFIX_LEN: usize = 9;

pub struct ColumnBoard<A: BoardApi> {
    api: Arc<A>,
    board_id: Uuid,
    columns: Vec<Column>,
}

impl<A: BoardApi> ColumnBoard<A> {
    /// An empty column set. Call [`ColumnBoard::reload`] to fetch.
    pub fn new(api: Arc<A>, board_id: Uuid) -> Self {
        Self {
            api,
            board_id,
            columns: Vec::new(),
        }
    }

    pub async fn load(api: Arc<A>, board_id: Uuid) -> SyncResult<Self> {
        let mut board = Self::new(api, board_id);
        board.reload().await?;
        Ok(board)
    }

    pub async fn reload(&mut self) -> SyncResult<()> {
        let mut columns = self.api.list_columns(self.board_id).await?;
        // Stable: equal positions keep server order
        columns.sort_by_key(|c| c.position);
        tracing::debug!(
            "COLUMNS: Loaded {} columns for board {}",
            columns.len(),
            self.board_id
        );
        self.columns = columns;
        Ok(())
    }

    pub fn board_id(&self) -> Uuid {
        self.board_id
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, column_id: Uuid) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    /// Status for tasks created without an explicit lane.
    pub fn default_status(&self) -> &str {
        self.columns
            .first()
            .map(|c| c.status_id.as_str())
            .unwrap_or(DEFAULT_TASK_STATUS)
    }

    /// Tasks of this board that sit in `column`, in store order.
    pub async fn tasks_in(&self, column: &Column, store: &SharedStore) -> Vec<Task> {
        let column = column.clone();
        let board_id = self.board_id;
        store
            .read(move |s| {
                s.tasks_in_column(&board_id, &column)
                    .into_iter()
                    .cloned()
                    .collect()
            })
            .await
    }

    pub async fn add_column(&mut self, title: &str) -> SyncResult<Column> {
        let title = title.trim();
        require_non_empty("column title", title)?;

        let request = NewColumn {
            board_id: self.board_id,
            title: title.to_string(),
            status_id: generate_status_id(),
            position: self.next_position()?,
        };
        request.validate()?;

        let column = self.api.create_column(&request).await?;
        tracing::info!(
            "COLUMNS: Added column {} ({}) to board {}",
            column.id,
            column.status_id,
            self.board_id
        );
        self.reload().await?;
        Ok(column)
    }

    /// Delete a column. Refused while any task of the board still uses its status.
    ///
    /// Deleting a column that is not loaded does nothing.
    pub async fn delete_column(&mut self, column_id: Uuid, store: &SharedStore) -> SyncResult<()> {
        let Some(column) = self.column(column_id).cloned() else {
            let err = SyncError::NotFoundLocal(format!("column {}", column_id));
            tracing::debug!("COLUMNS: Ignoring delete: {}", err);
            return Ok(());
        };

        let occupied = self.tasks_in(&column, store).await.len();
        if occupied > 0 {
            return Err(SyncError::validation(format!(
                "column '{}' still holds {} task(s); move them first",
                column.title, occupied
            )));
        }

        self.api.delete_column(column_id).await?;
        tracing::info!(
            "COLUMNS: Deleted column {} from board {}",
            column_id,
            self.board_id
        );
        self.reload().await
    }

    fn next_position(&self) -> SyncResult<i32> {
        match self.columns.iter().map(|c| c.position).max() {
            None => Ok(0),
            Some(max) => max.checked_add(1).ok_or_else(|| {
                SyncError::validation(format!(
                    "no column position left after {} on board {}",
                    max, self.board_id
                ))
            }),
        }
    }
}

/// `column-<unix millis>-<9 random chars>`
pub fn generate_status_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple().to_string();
    format!("column-{}-{}", millis, &random[..STATUS_SUFFIX_LEN])
}
