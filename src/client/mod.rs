//! Persistence clients.
//!
//! The task store reaches its backend only through [`TaskClient`]. Every
//! operation is asynchronous and independently failable; the store makes no
//! assumption about atomicity across calls.
//!
//! Implementations:
//! - [`RemoteClient`]: hosted JSON API over HTTP
//! - [`LocalClient`]: single JSON file, seeded from a fixed dataset
//! - [`MemoryClient`]: in-process collection with call counters and
//!   failure injection

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BackendConfig, BackendKind};
use crate::error::{Error, Result};
use crate::task::{Task, TaskDraft, TaskId, TaskPatch};

mod collection;
pub mod local;
pub mod memory;
pub mod remote;

pub use local::LocalClient;
pub use memory::MemoryClient;
pub use remote::RemoteClient;

/// Async CRUD gateway over the task collection.
#[async_trait]
pub trait TaskClient: Send + Sync {
    /// Short backend tag used in logs.
    fn backend(&self) -> &'static str;

    /// All tasks, newest first.
    async fn get_all(&self) -> Result<Vec<Task>>;

    async fn get_by_id(&self, id: TaskId) -> Result<Option<Task>>;

    /// Persist a draft. The backend assigns `id` and `created_at`.
    async fn create(&self, draft: TaskDraft) -> Result<Task>;

    /// Apply a partial update and return the stored record.
    async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<Task>;

    async fn delete(&self, id: TaskId) -> Result<()>;

    /// Flip `completed` and set or clear `completed_at`.
    async fn toggle_complete(&self, id: TaskId) -> Result<Task>;
}

/// Client operations, used for call accounting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientOp {
    GetAll,
    GetById,
    Create,
    Update,
    Delete,
    ToggleComplete,
}

impl ClientOp {
    pub const ALL: [ClientOp; 6] = [
        ClientOp::GetAll,
        ClientOp::GetById,
        ClientOp::Create,
        ClientOp::Update,
        ClientOp::Delete,
        ClientOp::ToggleComplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientOp::GetAll => "get_all",
            ClientOp::GetById => "get_by_id",
            ClientOp::Create => "create",
            ClientOp::Update => "update",
            ClientOp::Delete => "delete",
            ClientOp::ToggleComplete => "toggle_complete",
        }
    }

    fn index(&self) -> usize {
        match self {
            ClientOp::GetAll => 0,
            ClientOp::GetById => 1,
            ClientOp::Create => 2,
            ClientOp::Update => 3,
            ClientOp::Delete => 4,
            ClientOp::ToggleComplete => 5,
        }
    }
}

impl fmt::Display for ClientOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the client selected by the backend configuration.
pub fn connect(config: &BackendConfig) -> Result<Arc<dyn TaskClient>> {
    match config.kind {
        BackendKind::Remote => Ok(Arc::new(RemoteClient::new(&config.remote)?)),
        BackendKind::Local => {
            let base = match &config.local.data_dir {
                Some(dir) => dir.clone(),
                None => default_data_dir()?,
            };
            Ok(Arc::new(LocalClient::in_dir(&base)))
        }
        BackendKind::Memory => Ok(Arc::new(MemoryClient::seeded()?)),
    }
}

fn default_data_dir() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .ok_or_else(|| {
            Error::InvalidConfig(
                "cannot resolve a data directory; set backend.local.data_dir".to_string(),
            )
        })
}
