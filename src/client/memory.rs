//! In-process task collection.
//!
//! Behaves like the local store without touching disk. Each operation is
//! counted, and failures can be injected per operation, which makes it the
//! backend of choice for exercising the task store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{collection, ClientOp, TaskClient};
use crate::error::{Error, Result};
use crate::task::{Task, TaskDraft, TaskId, TaskPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailMode {
    Once,
    Always,
}

#[derive(Debug, Default)]
struct MemoryState {
    tasks: Vec<Task>,
    next_id: TaskId,
}

#[derive(Debug)]
pub struct MemoryClient {
    state: Mutex<MemoryState>,
    calls: [AtomicUsize; 6],
    deleted: StdMutex<Vec<TaskId>>,
    failures: StdMutex<HashMap<ClientOp, FailMode>>,
    latency: Option<Duration>,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::with_tasks(Vec::new())
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client holding the built-in dataset.
    pub fn seeded() -> Result<Self> {
        Ok(Self::with_tasks(collection::seed_tasks()?))
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let next_id = collection::next_id(&tasks);
        Self {
            state: Mutex::new(MemoryState { tasks, next_id }),
            calls: Default::default(),
            deleted: StdMutex::new(Vec::new()),
            failures: StdMutex::new(HashMap::new()),
            latency: None,
        }
    }

    /// Delay every operation by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Id handed out by the next `create`.
    pub async fn set_next_id(&self, id: TaskId) {
        self.state.lock().await.next_id = id;
    }

    /// Fail the next call of `op` only.
    pub fn fail_next(&self, op: ClientOp) {
        self.set_failure(op, Some(FailMode::Once));
    }

    /// Fail every call of `op` until [`MemoryClient::recover`].
    pub fn fail_always(&self, op: ClientOp) {
        self.set_failure(op, Some(FailMode::Always));
    }

    pub fn recover(&self, op: ClientOp) {
        self.set_failure(op, None);
    }

    pub fn calls(&self, op: ClientOp) -> usize {
        self.calls[op.index()].load(Ordering::SeqCst)
    }

    /// Ids passed to successful `delete` calls, in call order.
    pub fn deleted_ids(&self) -> Vec<TaskId> {
        self.deleted
            .lock()
            .map(|deleted| deleted.clone())
            .unwrap_or_default()
    }

    pub async fn stored(&self) -> Vec<Task> {
        collection::newest_first(&self.state.lock().await.tasks)
    }

    fn set_failure(&self, op: ClientOp, mode: Option<FailMode>) {
        if let Ok(mut failures) = self.failures.lock() {
            match mode {
                Some(mode) => {
                    failures.insert(op, mode);
                }
                None => {
                    failures.remove(&op);
                }
            }
        }
    }

    async fn enter(&self, op: ClientOp) -> Result<()> {
        self.calls[op.index()].fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mode = match self.failures.lock() {
            Ok(mut failures) => match failures.get(&op).copied() {
                Some(FailMode::Once) => failures.remove(&op),
                other => other,
            },
            Err(_) => None,
        };
        match mode {
            Some(_) => Err(Error::OperationFailed(format!("{op} failed (injected)"))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TaskClient for MemoryClient {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get_all(&self) -> Result<Vec<Task>> {
        self.enter(ClientOp::GetAll).await?;
        Ok(collection::newest_first(&self.state.lock().await.tasks))
    }

    async fn get_by_id(&self, id: TaskId) -> Result<Option<Task>> {
        self.enter(ClientOp::GetById).await?;
        Ok(collection::find(&self.state.lock().await.tasks, id))
    }

    async fn create(&self, draft: TaskDraft) -> Result<Task> {
        self.enter(ClientOp::Create).await?;
        let mut state = self.state.lock().await;
        let id = state.next_id.max(collection::next_id(&state.tasks));
        state.next_id = id + 1;
        Ok(collection::create(&mut state.tasks, id, draft))
    }

    async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<Task> {
        self.enter(ClientOp::Update).await?;
        let mut state = self.state.lock().await;
        collection::update(&mut state.tasks, id, &patch)
    }

    async fn delete(&self, id: TaskId) -> Result<()> {
        self.enter(ClientOp::Delete).await?;
        let mut state = self.state.lock().await;
        collection::delete(&mut state.tasks, id)?;
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(id);
        }
        Ok(())
    }

    async fn toggle_complete(&self, id: TaskId) -> Result<Task> {
        self.enter(ClientOp::ToggleComplete).await?;
        let mut state = self.state.lock().await;
        collection::toggle(&mut state.tasks, id)
    }
}
