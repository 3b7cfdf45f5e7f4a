//! Hosted backend client.
//!
//! Wire contract (JSON bodies, snake_case fields):
//!
//! | operation         | request                                   |
//! |-------------------|-------------------------------------------|
//! | `get_all`         | `GET    {base}/tasks`                     |
//! | `get_by_id`       | `GET    {base}/tasks/{id}` (404 = absent) |
//! | `create`          | `POST   {base}/tasks` with a draft        |
//! | `update`          | `PATCH  {base}/tasks/{id}` set fields only |
//! | `delete`          | `DELETE {base}/tasks/{id}`                |
//! | `toggle_complete` | `GET` then `PATCH` completed/completed_at |
//!
//! The toggle is read-then-write and therefore not atomic; a task deleted
//! between the two calls surfaces as `TaskNotFound`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;

use super::TaskClient;
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::task::{Task, TaskDraft, TaskId, TaskPatch};

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CompletionPatch {
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
}

impl RemoteClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    fn task_url(&self, id: TaskId) -> String {
        format!("{}/tasks/{id}", self.base_url)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn patch<B: Serialize + ?Sized>(&self, id: TaskId, body: &B) -> Result<Task> {
        let response = self
            .request(Method::PATCH, self.task_url(id))
            .json(body)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::TaskNotFound(id));
        }
        Ok(ensure_success(response).await?.json().await?)
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    if message.trim().is_empty() {
        message = status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }
    Err(Error::Backend {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl TaskClient for RemoteClient {
    fn backend(&self) -> &'static str {
        "remote"
    }

    async fn get_all(&self) -> Result<Vec<Task>> {
        let response = self
            .request(Method::GET, self.collection_url())
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn get_by_id(&self, id: TaskId) -> Result<Option<Task>> {
        let response = self.request(Method::GET, self.task_url(id)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(ensure_success(response).await?.json().await?))
    }

    async fn create(&self, draft: TaskDraft) -> Result<Task> {
        let response = self
            .request(Method::POST, self.collection_url())
            .json(&draft)
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<Task> {
        self.patch(id, &patch).await
    }

    async fn delete(&self, id: TaskId) -> Result<()> {
        let response = self
            .request(Method::DELETE, self.task_url(id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::TaskNotFound(id));
        }
        ensure_success(response).await?;
        Ok(())
    }

    async fn toggle_complete(&self, id: TaskId) -> Result<Task> {
        let current = self.get_by_id(id).await?.ok_or(Error::TaskNotFound(id))?;
        let completed = !current.completed;
        let body = CompletionPatch {
            completed,
            completed_at: completed.then(Utc::now),
        };
        self.patch(id, &body).await
    }
}
