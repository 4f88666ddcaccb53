//! REST collaborator.
//!
//! [`BoardApi`] is the seam between the sync engine and the board service. [`HttpApi`] talks to
//! the real service over `reqwest`; tests substitute an in-memory implementation.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use taskboard_core::models::{
    AuthResponse, Board, Column, LoginRequest, MoveTask, NewBoard, NewColumn, NewTask,
    RegisterRequest, Task, TaskPatch, User,
};
use taskboard_core::{SyncError, SyncResult};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::errors::ClientError;

pub trait BoardApi: Send + Sync + 'static {
    fn list_boards(&self) -> impl Future<Output = SyncResult<Vec<Board>>> + Send;
    fn get_board(&self, board_id: Uuid) -> impl Future<Output = SyncResult<Board>> + Send;
    fn create_board(&self, board: &NewBoard) -> impl Future<Output = SyncResult<Board>> + Send;
    fn update_board(
        &self,
        board_id: Uuid,
        board: &NewBoard,
    ) -> impl Future<Output = SyncResult<Board>> + Send;
    fn delete_board(&self, board_id: Uuid) -> impl Future<Output = SyncResult<()>> + Send;

    fn list_tasks(&self, board_id: Uuid) -> impl Future<Output = SyncResult<Vec<Task>>> + Send;
    fn get_task(&self, task_id: Uuid) -> impl Future<Output = SyncResult<Task>> + Send;
    fn create_task(&self, task: &NewTask) -> impl Future<Output = SyncResult<Task>> + Send;
    fn update_task(
        &self,
        task_id: Uuid,
        patch: &TaskPatch,
    ) -> impl Future<Output = SyncResult<Task>> + Send;
    fn move_task(&self, task_id: Uuid, status: &str) -> impl Future<Output = SyncResult<Task>> + Send;
    fn delete_task(&self, task_id: Uuid) -> impl Future<Output = SyncResult<()>> + Send;

    fn list_columns(&self, board_id: Uuid) -> impl Future<Output = SyncResult<Vec<Column>>> + Send;
    fn create_column(&self, column: &NewColumn) -> impl Future<Output = SyncResult<Column>> + Send;
    fn delete_column(&self, column_id: Uuid) -> impl Future<Output = SyncResult<()>> + Send;

    fn login(&self, credentials: &LoginRequest) -> impl Future<Output = SyncResult<AuthResponse>> + Send;
    fn register(
        &self,
        request: &RegisterRequest,
    ) -> impl Future<Output = SyncResult<AuthResponse>> + Send;
    fn current_user(&self) -> impl Future<Output = SyncResult<User>> + Send;
}

/// Bearer token and user for the logged-in account.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

#[derive(Clone)]
pub struct HttpApi {
    http: reqwest::Client,
    config: ClientConfig,
    session: Arc<RwLock<Session>>,
}

impl HttpApi {
    pub fn new(config: ClientConfig) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::from)?;
        Ok(Self {
            http,
            config,
            session: Arc::new(RwLock::new(Session::default())),
        })
    }

    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Use a token obtained elsewhere, e.g. restored by the host application.
    pub async fn set_token(&self, token: Option<String>) {
        self.session.write().await.token = token;
    }

    pub async fn logout(&self) {
        *self.session.write().await = Session::default();
    }

    async fn request(&self, method: Method, path: &str, authenticated: bool) -> RequestBuilder {
        let builder = self.http.request(method, self.config.api_url(path));
        if !authenticated {
            return builder;
        }
        match self.session.read().await.token.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> SyncResult<Response> {
        let response = builder.send().await.map_err(ClientError::from)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(request_error(status, body))
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> SyncResult<T> {
        let builder = self.request(Method::GET, path, false).await;
        let response = self.send(builder).await?;
        Ok(response.json::<T>().await.map_err(ClientError::from)?)
    }

    async fn write<B, T>(&self, method: Method, path: &str, body: &B) -> SyncResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(method, path, true).await.json(body);
        let response = self.send(builder).await?;
        Ok(response.json::<T>().await.map_err(ClientError::from)?)
    }

    async fn remove(&self, path: &str) -> SyncResult<()> {
        let builder = self.request(Method::DELETE, path, true).await;
        self.send(builder).await?;
        Ok(())
    }

    /// Post credentials and keep the returned token for later writes.
    async fn authenticate<B: Serialize>(&self, path: &str, body: &B) -> SyncResult<AuthResponse> {
        let builder = self.request(Method::POST, path, false).await.json(body);
        let response = self.send(builder).await?;
        let auth: AuthResponse = response.json().await.map_err(ClientError::from)?;

        *self.session.write().await = Session {
            token: Some(auth.token.clone()),
            user: Some(auth.user.clone()),
        };
        Ok(auth)
    }
}

fn request_error(status: StatusCode, body: String) -> SyncError {
    let body = body.trim();
    let message = if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    };
    SyncError::request(status.as_u16(), message)
}

impl BoardApi for HttpApi {
    async fn list_boards(&self) -> SyncResult<Vec<Board>> {
        self.fetch("/boards").await
    }

    async fn get_board(&self, board_id: Uuid) -> SyncResult<Board> {
        self.fetch(&format!("/boards/{}", board_id)).await
    }

    async fn create_board(&self, board: &NewBoard) -> SyncResult<Board> {
        self.write(Method::POST, "/boards", board).await
    }

    async fn update_board(&self, board_id: Uuid, board: &NewBoard) -> SyncResult<Board> {
        self.write(Method::PUT, &format!("/boards/{}", board_id), board)
            .await
    }

    async fn delete_board(&self, board_id: Uuid) -> SyncResult<()> {
        self.remove(&format!("/boards/{}", board_id)).await
    }

    async fn list_tasks(&self, board_id: Uuid) -> SyncResult<Vec<Task>> {
        self.fetch(&format!("/tasks?board_id={}", board_id)).await
    }

    async fn get_task(&self, task_id: Uuid) -> SyncResult<Task> {
        self.fetch(&format!("/tasks/{}", task_id)).await
    }

    async fn create_task(&self, task: &NewTask) -> SyncResult<Task> {
        self.write(Method::POST, "/tasks", task).await
    }

    async fn update_task(&self, task_id: Uuid, patch: &TaskPatch) -> SyncResult<Task> {
        self.write(Method::PUT, &format!("/tasks/{}", task_id), patch)
            .await
    }

    async fn move_task(&self, task_id: Uuid, status: &str) -> SyncResult<Task> {
        let body = MoveTask {
            status: status.to_string(),
        };
        self.write(Method::PATCH, &format!("/tasks/{}/move", task_id), &body)
            .await
    }

    async fn delete_task(&self, task_id: Uuid) -> SyncResult<()> {
        self.remove(&format!("/tasks/{}", task_id)).await
    }

    async fn list_columns(&self, board_id: Uuid) -> SyncResult<Vec<Column>> {
        self.fetch(&format!("/columns?board_id={}", board_id)).await
    }

    async fn create_column(&self, column: &NewColumn) -> SyncResult<Column> {
        self.write(Method::POST, "/columns", column).await
    }

    async fn delete_column(&self, column_id: Uuid) -> SyncResult<()> {
        self.remove(&format!("/columns/{}", column_id)).await
    }

    async fn login(&self, credentials: &LoginRequest) -> SyncResult<AuthResponse> {
        credentials.validate()?;
        let auth = self.authenticate("/auth/login", credentials).await?;
        tracing::info!("API: Logged in as {}", auth.user.username);
        Ok(auth)
    }

    async fn register(&self, request: &RegisterRequest) -> SyncResult<AuthResponse> {
        request.validate()?;
        let auth = self.authenticate("/auth/register", request).await?;
        tracing::info!("API: Registered and logged in as {}", auth.user.username);
        Ok(auth)
    }

    async fn current_user(&self) -> SyncResult<User> {
        let builder = self.request(Method::GET, "/auth/me", true).await;
        let response = self.send(builder).await?;
        Ok(response.json::<User>().await.map_err(ClientError::from)?)
    }
}
