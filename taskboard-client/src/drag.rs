//! Turns a finished drag gesture into a single move command.
//!
//! Pointer handling lives in the UI. This controller only remembers which task was lifted and,
//! when the gesture ends, decides whether a `move_task` is due.

use taskboard_core::models::Task;
use taskboard_core::SyncResult;
use uuid::Uuid;

use crate::api::BoardApi;
use crate::columns::ColumnBoard;
use crate::commands::CommandLayer;

#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// Nothing was lifted, or the task was released outside any column.
    NoDrop,
    Moved(Task),
}

#[derive(Debug, Default)]
pub struct DragMoveController {
    lifted: Option<Task>,
}

impl DragMoveController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifted(&self) -> Option<&Task> {
        self.lifted.as_ref()
    }

    /// Lift a task by id. Unknown ids leave the controller idle.
    pub fn drag_start(&mut self, board_tasks: &[Task], task_id: Uuid) {
        self.lifted = board_tasks.iter().find(|t| t.id == task_id).cloned();
        if self.lifted.is_none() {
            tracing::debug!("DRAG: Task {} not on board, nothing lifted", task_id);
        }
    }

    pub fn cancel(&mut self) {
        self.lifted = None;
    }

    /// Finish the gesture over `target_column`, or over nothing.
    ///
    /// The lifted task is cleared before any command runs, whatever the result.
    pub async fn drag_end<A: BoardApi>(
        &mut self,
        target_column: Option<Uuid>,
        columns: &ColumnBoard<A>,
        commands: &CommandLayer<A>,
    ) -> SyncResult<DropOutcome> {
        let Some(task) = self.lifted.take() else {
            return Ok(DropOutcome::NoDrop);
        };
        let Some(column) = target_column.and_then(|id| columns.column(id)) else {
            tracing::debug!("DRAG: Task {} released outside a column", task.id);
            return Ok(DropOutcome::NoDrop);
        };

        let moved = commands
            .move_task(task.id, &column.status_id, columns.board_id())
            .await?;
        Ok(DropOutcome::Moved(moved))
    }
}
