//! Change notifications for the presentation layer
//!
//! Every state change in the entity store, and every push-channel state transition, is queued as
//! a [`BoardEvent`]. A UI re-renders in response to these events instead of polling the store.
//!
//! # Thread Safety
//!
//! The dispatcher uses a single-thread callback model:
//! 1. Events can be generated from any thread or task
//! 2. Events are queued for processing, up to [`DEFAULT_QUEUE_CAPACITY`]; when the queue is full
//!    the oldest event is dropped
//! 3. Callbacks are only invoked when `process_events()` is called
//! 4. All callbacks execute on the thread that registered them

use crate::errors::{ClientError, ClientResult};
use crate::push::ConnectionState;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::thread::{self, ThreadId};
use uuid::Uuid;

/// Events kept for a host that has not called `process_events()` yet
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Event categories, used for filtered subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    BoardsLoaded,
    BoardUpserted,
    BoardRemoved,
    BoardRefreshed,
    TaskUpserted,
    TaskRemoved,
    ActiveBoardChanged,
    ConnectionStateChanged,
    SyncError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    /// The board list was replaced from the server
    BoardsLoaded { count: usize },
    /// A board was added or its metadata changed
    BoardUpserted { board_id: Uuid, name: String },
    /// A board and all of its tasks left the store
    BoardRemoved { board_id: Uuid },
    /// A board was replaced by an authoritative fetch
    BoardRefreshed { board_id: Uuid, task_count: usize },
    TaskUpserted {
        board_id: Uuid,
        task_id: Uuid,
        status: String,
    },
    TaskRemoved { board_id: Uuid, task_id: Uuid },
    ActiveBoardChanged { board_id: Option<Uuid> },
    ConnectionStateChanged {
        board_id: Uuid,
        state: ConnectionState,
    },
    /// A background error that was logged and self-healed
    SyncError { message: String },
}

impl BoardEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            BoardEvent::BoardsLoaded { .. } => EventType::BoardsLoaded,
            BoardEvent::BoardUpserted { .. } => EventType::BoardUpserted,
            BoardEvent::BoardRemoved { .. } => EventType::BoardRemoved,
            BoardEvent::BoardRefreshed { .. } => EventType::BoardRefreshed,
            BoardEvent::TaskUpserted { .. } => EventType::TaskUpserted,
            BoardEvent::TaskRemoved { .. } => EventType::TaskRemoved,
            BoardEvent::ActiveBoardChanged { .. } => EventType::ActiveBoardChanged,
            BoardEvent::ConnectionStateChanged { .. } => EventType::ConnectionStateChanged,
            BoardEvent::SyncError { .. } => EventType::SyncError,
        }
    }
}

struct CallbackEntry {
    callback: Box<dyn Fn(&BoardEvent) + Send>,
    event_filter: Option<EventType>,
}

/// Thread-safe event dispatcher for managing callbacks and event processing
///
/// # Example
///
/// ```rust,no_run
/// use taskboard_client::events::{BoardEvent, EventDispatcher};
///
/// let dispatcher = EventDispatcher::new();
///
/// dispatcher.register_callback(|event| {
///     if let BoardEvent::TaskUpserted { task_id, status, .. } = event {
///         println!("{} is now in {}", task_id, status);
///     }
/// }).unwrap();
///
/// // In the UI loop
/// let processed = dispatcher.process_events().unwrap();
/// ```
pub struct EventDispatcher {
    callbacks: Mutex<Vec<CallbackEntry>>,
    event_queue: Mutex<VecDeque<BoardEvent>>,
    capacity: usize,
    callback_thread_id: Mutex<Option<ThreadId>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Dispatcher whose queue holds at most `capacity` events (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            callbacks: Mutex::new(Vec::new()),
            event_queue: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_QUEUE_CAPACITY))),
            capacity,
            callback_thread_id: Mutex::new(None),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events waiting for `process_events()`.
    pub fn queued(&self) -> ClientResult<usize> {
        let queue = self
            .event_queue
            .lock()
            .map_err(|_| ClientError::LockError("event queue".into()))?;
        Ok(queue.len())
    }

    /// Helper to set callback thread ID on first registration
    fn ensure_callback_thread(&self) -> ClientResult<()> {
        let mut thread_id = self
            .callback_thread_id
            .lock()
            .map_err(|_| ClientError::LockError("thread ID".into()))?;
        if thread_id.is_none() {
            *thread_id = Some(thread::current().id());
            tracing::info!(
                "Board events will be processed on thread: {:?}",
                thread::current().id()
            );
        }
        Ok(())
    }

    /// Register a callback for all events
    pub fn register_callback<F>(&self, callback: F) -> ClientResult<()>
    where
        F: Fn(&BoardEvent) + Send + 'static,
    {
        self.push_entry(Box::new(callback), None)
    }

    /// Register a callback that only receives events of one type
    pub fn register_callback_filtered<F>(&self, callback: F, event_filter: EventType) -> ClientResult<()>
    where
        F: Fn(&BoardEvent) + Send + 'static,
    {
        self.push_entry(Box::new(callback), Some(event_filter))
    }

    fn push_entry(
        &self,
        callback: Box<dyn Fn(&BoardEvent) + Send>,
        event_filter: Option<EventType>,
    ) -> ClientResult<()> {
        self.ensure_callback_thread()?;

        let mut callbacks = self
            .callbacks
            .lock()
            .map_err(|_| ClientError::LockError("callbacks".into()))?;

        callbacks.push(CallbackEntry {
            callback,
            event_filter,
        });

        Ok(())
    }

    /// Queue an event for later processing on the callback thread.
    ///
    /// A full queue drops its oldest event.
    pub fn emit(&self, event: BoardEvent) {
        tracing::debug!("Queueing board event: {:?}", event.event_type());
        let Ok(mut queue) = self.event_queue.lock() else {
            tracing::error!("Failed to queue event - event queue lock poisoned");
            return;
        };
        if queue.len() >= self.capacity {
            if let Some(dropped) = queue.pop_front() {
                tracing::warn!(
                    "Event queue full ({}), dropping oldest {:?} event",
                    self.capacity,
                    dropped.event_type()
                );
            }
        }
        queue.push_back(event);
    }

    pub fn emit_sync_error(&self, message: &str) {
        self.emit(BoardEvent::SyncError {
            message: message.to_string(),
        });
    }

    pub fn emit_connection_state(&self, board_id: Uuid, state: ConnectionState) {
        self.emit(BoardEvent::ConnectionStateChanged { board_id, state });
    }

    /// Process all queued events. This MUST be called on the same thread where callbacks were registered.
    pub fn process_events(&self) -> ClientResult<usize> {
        {
            let thread_id = self
                .callback_thread_id
                .lock()
                .map_err(|_| ClientError::LockError("thread ID".into()))?;
            match *thread_id {
                Some(expected) if thread::current().id() != expected => {
                    return Err(ClientError::ThreadSafetyViolation)
                }
                Some(_) => {}
                None => return Err(ClientError::NoCallbacksRegistered),
            }
        }

        let callbacks = self
            .callbacks
            .lock()
            .map_err(|_| ClientError::LockError("callbacks".into()))?;
        // Taken out first so callbacks may emit without deadlocking
        let pending: Vec<BoardEvent> = {
            let mut queue = self
                .event_queue
                .lock()
                .map_err(|_| ClientError::LockError("event queue".into()))?;
            queue.drain(..).collect()
        };

        let mut processed_count = 0;
        for event in pending {
            let event_type = event.event_type();
            for entry in callbacks.iter() {
                if let Some(filter) = entry.event_filter {
                    if filter != event_type {
                        continue;
                    }
                }
                (entry.callback)(&event);
            }
            processed_count += 1;
        }

        Ok(processed_count)
    }

    /// Drop everything queued so far without invoking callbacks.
    pub fn drain(&self) -> ClientResult<usize> {
        let mut queue = self
            .event_queue
            .lock()
            .map_err(|_| ClientError::LockError("event queue".into()))?;
        Ok(queue.drain(..).count())
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
