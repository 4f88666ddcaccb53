//! Taskboard - collaborative task boards kept in sync across clients
//!
//! This crate provides a unified API for the taskboard sync engine.
//!
//! # Example
//!
//! ```ignore
//! use taskboard::{ClientConfig, SyncEngine};
//!
//! let engine = SyncEngine::connect(ClientConfig::default())?;
//! let session = engine.open_board(board_id).await?;
//! session.create_task("Triage bugs", "").await?;
//! ```

// Re-export client types
pub use taskboard_client::{
    BoardEvent, BoardSession, ClientConfig, ConnectionState, EventType, SyncEngine,
};

// Re-export core types that applications need
pub use taskboard_core::errors::SyncError;
pub use taskboard_core::models::{Board, Column, NewTask, Priority, Task, TaskPatch};
pub use taskboard_core::SyncResult;
