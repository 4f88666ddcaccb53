use clap::Parser;
use std::time::Duration;
use taskboard_client::{BoardEvent, ClientConfig, SyncEngine};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "board-watch")]
#[command(about = "Follow a task board and print every change as it syncs", long_about = None)]
struct Cli {
    /// Board to open and watch
    board_id: Uuid,

    /// REST base URL (push endpoint is derived from it unless --ws-url is given)
    #[arg(short, long, env = "TASKBOARD_API_URL")]
    api_url: Option<String>,

    /// WebSocket base URL
    #[arg(long, env = "TASKBOARD_WS_URL")]
    ws_url: Option<String>,

    /// Delay before reconnecting a dropped push channel, in milliseconds
    #[arg(long, env = "TASKBOARD_RECONNECT_DELAY_MS")]
    reconnect_delay_ms: Option<u64>,

    #[arg(short, long, env = "TASKBOARD_USERNAME")]
    username: Option<String>,

    #[arg(short, long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskboard_client=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = &cli.api_url {
        config = config.with_api_url(api_url);
    }
    if let Some(ws_url) = &cli.ws_url {
        config = config.with_ws_base_url(ws_url);
    }
    if let Some(ms) = cli.reconnect_delay_ms {
        config = config.with_reconnect_delay(Duration::from_millis(ms));
    }

    let engine = SyncEngine::connect(config)?;

    if let (Some(username), Some(password)) = (&cli.username, &cli.password) {
        let user = engine.login(username, password).await?;
        println!("Logged in as {}", user.username);
    }

    engine.events().register_callback(print_event)?;

    let session = engine.open_board(cli.board_id).await?;
    for column in session.columns() {
        let tasks = session.tasks_in(column.id).await;
        println!("[{}] {} task(s)", column.title, tasks.len());
        for task in tasks {
            println!("  - {} ({})", task.title, task.id);
        }
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                engine.events().process_events()?;
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping");
                break;
            }
        }
    }

    engine.shutdown()?;
    Ok(())
}

fn print_event(event: &BoardEvent) {
    match event {
        BoardEvent::TaskUpserted {
            task_id, status, ..
        } => println!("task {} -> {}", task_id, status),
        BoardEvent::TaskRemoved { task_id, .. } => println!("task {} removed", task_id),
        BoardEvent::BoardRefreshed {
            board_id,
            task_count,
        } => println!("board {} refreshed ({} tasks)", board_id, task_count),
        BoardEvent::ConnectionStateChanged { state, .. } => println!("push channel {}", state),
        BoardEvent::SyncError { message } => eprintln!("sync error: {}", message),
        other => tracing::debug!("{:?}", other),
    }
}
