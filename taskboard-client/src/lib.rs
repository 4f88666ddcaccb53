//! Client-side synchronization for the task board.
//!
//! The crate keeps an in-memory copy of boards and tasks consistent with the board service:
//! commands are validated, sent over REST and applied once the server confirms; live updates
//! arrive over a per-board WebSocket and are followed by a full refresh of the board.
//!
//! ```rust,no_run
//! use taskboard_client::{ClientConfig, SyncEngine};
//!
//! # async fn run(board_id: uuid::Uuid) -> taskboard_core::SyncResult<()> {
//! let engine = SyncEngine::connect(ClientConfig::from_env().map_err(taskboard_core::SyncError::from)?)?;
//! engine.login("ann", "secret").await?;
//! let session = engine.open_board(board_id).await?;
//! session.create_task("Write release notes", "").await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod columns;
pub mod commands;
pub mod config;
pub mod drag;
pub mod errors;
pub mod events;
pub mod push;
pub mod store;

pub use api::{BoardApi, HttpApi, Session};
pub use client::{BoardSession, SyncEngine};
pub use columns::ColumnBoard;
pub use commands::CommandLayer;
pub use config::ClientConfig;
pub use drag::{DragMoveController, DropOutcome};
pub use errors::{ClientError, ClientResult};
pub use events::{BoardEvent, EventDispatcher, EventType};
pub use push::{ConnectionState, PushChannel, PushChannelManager, PushTransport, WsTransport};
pub use store::{EntityStore, SharedStore};
