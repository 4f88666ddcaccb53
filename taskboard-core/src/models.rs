use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::errors::{SyncError, SyncResult};

/// Status given to new tasks when the caller does not pick one.
pub const DEFAULT_TASK_STATUS: &str = "plan";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    // List responses omit tasks entirely
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Board {
    pub fn task(&self, task_id: &Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == *task_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    pub status_id: String,
    pub position: i32,
}

impl Column {
    pub fn holds(&self, task: &Task) -> bool {
        task.status == self.status_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

// =============================================================================
// Request bodies
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewBoard {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewBoard {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            name: name.into(),
            description,
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        require_non_empty("board name", &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub board_id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

impl NewTask {
    pub fn new(board_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            board_id,
            title: title.into(),
            description: String::new(),
            status: None,
            priority: None,
            assignee: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn validate(&self) -> SyncResult<()> {
        require_non_empty("task title", &self.title)?;
        if let Some(status) = &self.status {
            require_non_empty("task status", status)?;
        }
        Ok(())
    }

    /// Fill in the default status so the request always names a lane.
    pub fn normalized(mut self) -> Self {
        if self.status.is_none() {
            self.status = Some(DEFAULT_TASK_STATUS.to_string());
        }
        self
    }
}

/// Partial task update. Absent fields are left out of the request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

impl TaskPatch {
    pub fn validate(&self) -> SyncResult<()> {
        if let Some(title) = &self.title {
            require_non_empty("task title", title)?;
        }
        if let Some(status) = &self.status {
            require_non_empty("task status", status)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }

    /// Apply the patch to a local copy of a task.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(status) = &self.status {
            task.status = status.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = Some(priority);
        }
        if let Some(assignee) = &self.assignee {
            task.assignee = Some(assignee.clone());
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveTask {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewColumn {
    pub board_id: Uuid,
    pub title: String,
    pub status_id: String,
    pub position: i32,
}

impl NewColumn {
    pub fn validate(&self) -> SyncResult<()> {
        require_non_empty("column title", &self.title)?;
        require_non_empty("column status id", &self.status_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> SyncResult<()> {
        require_non_empty("username", &self.username)?;
        if self.password.is_empty() {
            return Err(SyncError::validation("password must not be empty"));
        }
        Ok(())
    }
}

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> SyncResult<()> {
        require_non_empty("username", &self.username)?;
        require_non_empty("email", &self.email)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SyncError::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

pub fn require_non_empty(field: &str, value: &str) -> SyncResult<()> {
    if value.trim().is_empty() {
        return Err(SyncError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}
