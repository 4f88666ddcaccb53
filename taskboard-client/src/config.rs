use std::time::Duration;
use uuid::Uuid;

use crate::errors::{ClientError, ClientResult};

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
/// Fixed delay between a push channel closing and the next connect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);
/// Shorter reconnect delays are raised to this.
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub ws_base_url: String,
    pub reconnect_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    pub fn new(api_base_url: &str) -> Self {
        let api_base_url = api_base_url.trim_end_matches('/').to_string();
        Self {
            ws_base_url: derive_ws_base(&api_base_url),
            api_base_url,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Build from `TASKBOARD_*` environment variables, falling back to defaults.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("TASKBOARD_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut config = Self::new(&api_url);

        if let Some(ws_url) = lookup("TASKBOARD_WS_URL") {
            config.ws_base_url = ws_url.trim_end_matches('/').to_string();
        }
        if let Some(ms) = lookup("TASKBOARD_RECONNECT_DELAY_MS") {
            config = config
                .with_reconnect_delay(parse_millis("TASKBOARD_RECONNECT_DELAY_MS", &ms)?);
        }
        if let Some(ms) = lookup("TASKBOARD_REQUEST_TIMEOUT_MS") {
            config.request_timeout = parse_millis("TASKBOARD_REQUEST_TIMEOUT_MS", &ms)?;
        }

        Ok(config)
    }

    /// Point at another API, re-deriving the push endpoint from it.
    pub fn with_api_url(mut self, api_base_url: &str) -> Self {
        self.api_base_url = api_base_url.trim_end_matches('/').to_string();
        self.ws_base_url = derive_ws_base(&self.api_base_url);
        self
    }

    /// Set the reconnect delay, never below [`MIN_RECONNECT_DELAY`].
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay.max(MIN_RECONNECT_DELAY);
        self
    }

    pub fn with_ws_base_url(mut self, ws_base_url: &str) -> Self {
        self.ws_base_url = ws_base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    pub fn push_url(&self, board_id: &Uuid) -> String {
        format!("{}/ws/board/{}", self.ws_base_url, board_id)
    }
}

/// `http://host:8080/api` becomes `ws://host:8080`.
fn derive_ws_base(api_base_url: &str) -> String {
    let base = api_base_url.trim_end_matches("/api");
    if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    }
}

fn parse_millis(key: &str, value: &str) -> ClientResult<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ClientError::Config(format!("{} must be milliseconds: {}", key, e)))
}
