mod common;

use common::{make_board, make_task, MockApi};
use std::sync::{Arc, Mutex};
use taskboard_client::events::{BoardEvent, EventDispatcher, EventType};
use taskboard_client::push::apply_frame;
use taskboard_client::{CommandLayer, SharedStore};
use taskboard_core::models::{NewTask, TaskPatch};
use taskboard_core::SyncError;

fn setup(api: MockApi) -> (Arc<MockApi>, CommandLayer<MockApi>) {
    let api = Arc::new(api);
    let store = SharedStore::new(Arc::new(EventDispatcher::new()));
    let commands = CommandLayer::new(api.clone(), store);
    (api, commands)
}

#[tokio::test]
async fn test_validation_failures_make_no_network_call() {
    let board = make_board("Sprint");
    let board_id = board.id;
    let (api, commands) = setup(MockApi::new().with_board(board));

    let err = commands.create_board("   ", None).await.unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));

    let err = commands
        .create_task(NewTask::new(board_id, ""))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));

    let err = commands
        .move_task(uuid::Uuid::new_v4(), " ", board_id)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));

    let patch = TaskPatch {
        title: Some(String::new()),
        ..Default::default()
    };
    let err = commands
        .update_task(board_id, uuid::Uuid::new_v4(), patch)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));

    let err = commands
        .update_task(board_id, uuid::Uuid::new_v4(), TaskPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));

    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_failed_command_leaves_store_untouched() {
    let mut board = make_board("Sprint");
    let task = make_task(board.id, "Ship it", "plan");
    board.tasks.push(task.clone());
    let board_id = board.id;
    let (api, commands) = setup(MockApi::new().with_board(board));

    commands.load_board(board_id).await.unwrap();
    let before = commands.store().snapshot().await;

    api.fail_next(SyncError::request(500, "database unavailable"));
    let err = commands
        .move_task(task.id, "testing", board_id)
        .await
        .unwrap_err();
    assert_eq!(err, SyncError::request(500, "database unavailable"));
    assert_eq!(err.to_string(), "Request failed (500): database unavailable");

    api.fail_next(SyncError::Transport("connection reset".to_string()));
    assert!(commands.delete_task(task.id, board_id).await.is_err());

    assert_eq!(commands.store().snapshot().await, before);
}

#[tokio::test]
async fn test_move_changes_only_status() {
    let mut board = make_board("Sprint");
    let t1 = make_task(board.id, "T1", "plan");
    let t2 = make_task(board.id, "T2", "plan");
    board.tasks = vec![t1.clone(), t2.clone()];
    let board_id = board.id;
    let (api, commands) = setup(MockApi::new().with_board(board));
    commands.load_board(board_id).await.unwrap();

    let moved = commands.move_task(t1.id, "testing", board_id).await.unwrap();
    assert_eq!(moved.status, "testing");

    let store = commands.store();
    let stored = store.task(board_id, t1.id).await.unwrap();
    let mut expected = t1.clone();
    expected.status = "testing".to_string();
    assert_eq!(stored, expected);
    assert_eq!(store.task(board_id, t2.id).await.unwrap(), t2);

    // Position in the list is kept
    let ids: Vec<_> = store.tasks(board_id).await.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![t1.id, t2.id]);

    assert_eq!(api.calls(), vec!["get_board", "move_task", "get_board"]);
}

#[tokio::test]
async fn test_create_task_defaults_to_plan_and_appends() {
    let mut board = make_board("Sprint");
    let existing = make_task(board.id, "Existing", "doing");
    board.tasks.push(existing.clone());
    let board_id = board.id;
    let (_api, commands) = setup(MockApi::new().with_board(board));
    commands.load_board(board_id).await.unwrap();

    let created = commands
        .create_task(NewTask::new(board_id, "Write tests").with_description("unit + integration"))
        .await
        .unwrap();
    assert_eq!(created.status, "plan");
    assert_eq!(created.description, "unit + integration");

    let tasks = commands.store().tasks(board_id).await;
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].id, existing.id);
    assert_eq!(tasks[1].id, created.id);
}

#[tokio::test]
async fn test_update_task_applies_server_copy() {
    let mut board = make_board("Sprint");
    let task = make_task(board.id, "Draft", "plan");
    board.tasks.push(task.clone());
    let board_id = board.id;
    let (_api, commands) = setup(MockApi::new().with_board(board));
    commands.load_board(board_id).await.unwrap();

    let patch = TaskPatch {
        title: Some("Final".to_string()),
        assignee: Some("ann".to_string()),
        ..Default::default()
    };
    let updated = commands.update_task(board_id, task.id, patch).await.unwrap();
    assert_eq!(updated.title, "Final");

    let stored = commands.store().task(board_id, task.id).await.unwrap();
    assert_eq!(stored.title, "Final");
    assert_eq!(stored.assignee.as_deref(), Some("ann"));
    assert_eq!(stored.status, "plan");
}

#[tokio::test]
async fn test_delete_board_cascades_and_clears_selection() {
    let mut board = make_board("Sprint");
    board.tasks = vec![
        make_task(board.id, "T1", "plan"),
        make_task(board.id, "T2", "doing"),
    ];
    let board_id = board.id;
    let (api, commands) = setup(MockApi::new().with_board(board.clone()));

    commands.load_board(board_id).await.unwrap();
    commands.store().set_active_board(Some(board_id)).await;

    commands.delete_board(board_id).await.unwrap();

    let store = commands.store();
    assert!(store.board(board_id).await.is_none());
    assert!(store.tasks(board_id).await.is_empty());
    assert_eq!(store.active_board().await, None);
    // No refresh after deleting a board
    assert_eq!(api.call_count("get_board"), 1);

    // A refresh arriving late must not bring it back
    assert!(!store.refresh_board(board).await);
    assert!(store.board(board_id).await.is_none());
}

#[tokio::test]
async fn test_board_commands() {
    let (api, commands) = setup(MockApi::new());

    let board = commands
        .create_board("  Roadmap ", Some("Q3".to_string()))
        .await
        .unwrap();
    assert_eq!(board.name, "Roadmap");
    assert_eq!(commands.store().board(board.id).await.unwrap().name, "Roadmap");

    let renamed = commands
        .update_board(board.id, "Roadmap 2025", None)
        .await
        .unwrap();
    assert_eq!(renamed.name, "Roadmap 2025");

    let boards = commands.load_boards().await.unwrap();
    assert_eq!(boards.len(), 1);
    assert_eq!(commands.store().snapshot().await.boards().len(), 1);
    assert_eq!(api.server_board(board.id).unwrap().name, "Roadmap 2025");
}

#[tokio::test]
async fn test_server_error_message_is_returned() {
    let board = make_board("Sprint");
    let board_id = board.id;
    let (api, commands) = setup(MockApi::new().with_board(board));

    api.fail_next(SyncError::request(400, "title too long"));
    let err = commands
        .create_task(NewTask::new(board_id, "x"))
        .await
        .unwrap_err();
    assert!(err.is_remote());
    assert!(err.to_string().contains("title too long"));
}

#[tokio::test]
async fn test_refresh_failure_is_logged_not_surfaced() {
    let board = make_board("Sprint");
    let board_id = board.id;
    let (api, commands) = setup(MockApi::new().with_board(board));
    commands.load_board(board_id).await.unwrap();

    let errors = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = errors.clone();
    let events = commands.store().events();
    events
        .register_callback_filtered(
            move |event| {
                if let BoardEvent::SyncError { message } = event {
                    errors_clone.lock().unwrap().push(message.clone());
                }
            },
            EventType::SyncError,
        )
        .unwrap();

    api.fail_method("get_board", SyncError::Transport("timeout".to_string()));
    let created = commands
        .create_task(NewTask::new(board_id, "Survives"))
        .await
        .unwrap();
    assert!(commands.store().task(board_id, created.id).await.is_some());

    events.process_events().unwrap();
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("timeout"));
}

#[tokio::test]
async fn test_interleaved_push_and_commands_converge() {
    let mut board = make_board("Sprint");
    let task = make_task(board.id, "Shared", "plan");
    board.tasks.push(task.clone());
    let board_id = board.id;
    let (api, commands) = setup(MockApi::new().with_board(board));
    commands.load_board(board_id).await.unwrap();
    let store = commands.store();

    // Another client moves it; we rename it before hearing about the move
    let mut remote = task.clone();
    remote.status = "doing".to_string();
    api.server_upsert_task(board_id, remote.clone());
    let patch = TaskPatch {
        title: Some("Shared (renamed)".to_string()),
        ..Default::default()
    };
    commands.update_task(board_id, task.id, patch).await.unwrap();

    // A stale push payload lands last and wins locally
    let stale = common::task_frame("task_updated", board_id, &remote);
    apply_frame(store, board_id, &stale).await.unwrap();
    assert_eq!(store.task(board_id, task.id).await.unwrap(), remote);

    // The follow-up refresh restores the server copy
    commands.refresh_board(board_id).await.unwrap();
    let server = api.server_board(board_id).unwrap();
    assert_eq!(store.board(board_id).await.unwrap(), server);
    assert_eq!(
        store.task(board_id, task.id).await.unwrap().title,
        "Shared (renamed)"
    );
}

#[tokio::test]
async fn test_list_tasks_is_not_cached() {
    let mut board = make_board("Sprint");
    board.tasks.push(make_task(board.id, "A", "plan"));
    let board_id = board.id;
    let (_api, commands) = setup(MockApi::new().with_board(board));

    let tasks = commands.list_tasks(board_id).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(commands.store().board(board_id).await.is_none());
}

#[tokio::test]
async fn test_get_task_reads_from_server() {
    let mut board = make_board("Sprint");
    let task = make_task(board.id, "A", "plan");
    board.tasks.push(task.clone());
    let board_id = board.id;
    let (api, commands) = setup(MockApi::new().with_board(board));

    assert_eq!(commands.get_task(task.id).await.unwrap(), task);
    assert!(commands.store().board(board_id).await.is_none());

    let err = commands.get_task(uuid::Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err, SyncError::request(404, "task not found"));
    assert_eq!(api.call_count("get_task"), 2);
}
