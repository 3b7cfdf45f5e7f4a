//! The task store: the session's authoritative task list.
//!
//! # Invariants
//! - Intents (`load`, `add`, `toggle`, `update`, `remove`, `undo`,
//!   `undo_task`) run one at a time, in the order they were issued.
//! - `toggle` and `update` replace the in-memory record with the backend's
//!   response; nothing is flipped or merged locally.
//! - A failed backend call leaves the list exactly as it was. Removal is the
//!   exception: the local removal is never rolled back.
//! - A removed task stays in the pending registry until either its timer
//!   claims it (and the backend delete is issued) or an undo restores it.
//!   Both sides claim the entry under the state lock, so exactly one wins.
//! - A claimed removal stays hidden from `load` until its backend delete
//!   has returned and no load that could have read the old record is
//!   still in flight.
//! - The state lock is never held across an `.await`.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::client::TaskClient;
use crate::config::{ShutdownPolicy, StoreSettings, UndoPolicy};
use crate::error::Error;
use crate::events::{NotificationReceiver, Notifier};
use crate::task::{normalize_title, PriorityFilter, Task, TaskDraft, TaskId, TaskPatch};
use crate::view::{self, TaskViews};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOp {
    Add,
    Toggle,
    Update,
    Delete,
}

impl MutationOp {
    /// Message shown to the user when this operation fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            MutationOp::Add => "Failed to add task",
            MutationOp::Toggle | MutationOp::Update => "Failed to update task",
            MutationOp::Delete => "Failed to delete task",
        }
    }
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationOp::Add => "add",
            MutationOp::Toggle => "toggle",
            MutationOp::Update => "update",
            MutationOp::Delete => "delete",
        })
    }
}

/// Classified failure returned by store intents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    #[error("{0}")]
    Validation(String),

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("failed to load tasks: {0}")]
    Load(String),

    #[error("{op} failed: {message}")]
    Mutation { op: MutationOp, message: String },
}

impl From<Failure> for Error {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Validation(message) => Error::InvalidArgument(message),
            Failure::NotFound(id) => Error::TaskNotFound(id),
            other => Error::OperationFailed(other.to_string()),
        }
    }
}

/// Point-in-time view of the store for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub tasks: Vec<Task>,
    pub loading: bool,
    pub error: Option<String>,
    pub filter: PriorityFilter,
    /// Task restored by the next `undo()`
    pub undo_target: Option<TaskId>,
    /// Tasks removed locally whose backend delete has not been issued yet
    pub pending_removals: Vec<TaskId>,
}

#[derive(Debug)]
struct PendingRemoval {
    seq: u64,
    task: Task,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct StoreState {
    tasks: Vec<Task>,
    loading: bool,
    error: Option<String>,
    filter: PriorityFilter,
    /// Removals inside their undo window, oldest first
    pending: Vec<PendingRemoval>,
    /// Undo slot for `UndoPolicy::Latest`
    undo_slot: Option<u64>,
    next_seq: u64,
    /// Claimed removals whose backend delete is in flight
    purging: HashSet<TaskId>,
    /// Deletes that returned while a load was in flight
    purged_during_load: HashSet<TaskId>,
}

impl StoreState {
    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }

    fn undo_target(&self, policy: UndoPolicy) -> Option<u64> {
        match policy {
            UndoPolicy::Latest => self.undo_slot,
            UndoPolicy::Stack => self.pending.last().map(|pending| pending.seq),
        }
    }

    fn take_pending(&mut self, seq: u64) -> Option<PendingRemoval> {
        let index = self.pending.iter().position(|pending| pending.seq == seq)?;
        if self.undo_slot == Some(seq) {
            self.undo_slot = None;
        }
        Some(self.pending.remove(index))
    }

    /// Claim a pending removal for its backend delete.
    fn claim(&mut self, seq: u64) -> Option<TaskId> {
        let pending = self.take_pending(seq)?;
        self.purging.insert(pending.task.id);
        Some(pending.task.id)
    }

    fn finish_purge(&mut self, id: TaskId) {
        self.purging.remove(&id);
        if self.loading {
            self.purged_during_load.insert(id);
        }
    }

    /// Ids a freshly fetched list must not bring back.
    fn hidden(&self) -> HashSet<TaskId> {
        self.pending
            .iter()
            .map(|pending| pending.task.id)
            .chain(self.purging.iter().copied())
            .chain(self.purged_during_load.iter().copied())
            .collect()
    }

    fn replace(&mut self, task: Task) {
        match self.position(task.id) {
            Some(index) => self.tasks[index] = task,
            None => tracing::debug!(id = task.id, "replaced task no longer in list"),
        }
    }
}

struct Inner {
    client: Arc<dyn TaskClient>,
    notifier: Notifier,
    settings: StoreSettings,
    /// Serializes intents; held across backend calls
    intents: tokio::sync::Mutex<()>,
    /// Observable state; never held across an await
    state: Mutex<StoreState>,
    timers: TaskTracker,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue the backend delete for a claimed removal.
    async fn purge(&self, id: TaskId) {
        let deleted = self.client.delete(id).await;
        self.state().finish_purge(id);
        match deleted {
            Ok(()) => tracing::info!(id, backend = self.client.backend(), "task deleted"),
            Err(err) => {
                tracing::warn!(id, error = %err, "deferred delete failed");
                self.notifier
                    .error(MutationOp::Delete.failure_message(), Some(id));
            }
        }
    }
}

/// Handle to the task store. Clones share the same store.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<Inner>,
}

impl fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("backend", &self.inner.client.backend())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl TaskStore {
    /// Create a store over `client`, returning the notification stream.
    pub fn new(
        client: Arc<dyn TaskClient>,
        settings: StoreSettings,
    ) -> (Self, NotificationReceiver) {
        let (notifier, rx) = Notifier::channel();
        let inner = Inner {
            client,
            notifier,
            settings,
            intents: tokio::sync::Mutex::new(()),
            state: Mutex::new(StoreState::default()),
            timers: TaskTracker::new(),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.inner.settings
    }

    /// Replace the list with the backend's full task list.
    ///
    /// Tasks still inside an undo window stay hidden.
    pub async fn load(&self) -> Result<usize, Failure> {
        let _intent = self.inner.intents.lock().await;
        {
            let mut state = self.inner.state();
            state.loading = true;
            state.error = None;
            state.purged_during_load.clear();
        }
        tracing::debug!(backend = self.inner.client.backend(), "loading tasks");

        let result = self.inner.client.get_all().await;

        let mut state = self.inner.state();
        state.loading = false;
        let hidden = state.hidden();
        state.purged_during_load.clear();
        match result {
            Ok(tasks) => {
                state.tasks = tasks
                    .into_iter()
                    .filter(|task| !hidden.contains(&task.id))
                    .collect();
                Ok(state.tasks.len())
            }
            Err(err) => {
                let message = err.to_string();
                state.error = Some(message.clone());
                drop(state);
                tracing::warn!(error = %err, "load failed");
                self.inner.notifier.error("Failed to load tasks", None);
                Err(Failure::Load(message))
            }
        }
    }

    /// Create a task from `title` and prepend it.
    ///
    /// A blank title is rejected without contacting the backend.
    pub async fn add(&self, title: &str) -> Result<Task, Failure> {
        let title = normalize_title(title)
            .ok_or_else(|| Failure::Validation("title cannot be empty".to_string()))?;

        let _intent = self.inner.intents.lock().await;
        tracing::debug!(%title, "add");
        match self.inner.client.create(TaskDraft::new(title)).await {
            Ok(task) => {
                {
                    let mut state = self.inner.state();
                    state.tasks.retain(|existing| existing.id != task.id);
                    state.tasks.insert(0, task.clone());
                }
                self.inner
                    .notifier
                    .success("Task added successfully!", Some(task.id));
                Ok(task)
            }
            Err(err) => Err(self.mutation_failed(MutationOp::Add, None, err)),
        }
    }

    /// Toggle completion through the backend and adopt its record.
    pub async fn toggle(&self, id: TaskId) -> Result<Task, Failure> {
        let _intent = self.inner.intents.lock().await;
        self.ensure_present(MutationOp::Toggle, id)?;
        tracing::debug!(id, "toggle");

        match self.inner.client.toggle_complete(id).await {
            Ok(task) => {
                self.inner.state().replace(task.clone());
                let message = if task.completed {
                    "Task completed!"
                } else {
                    "Task reopened"
                };
                self.inner.notifier.success(message, Some(id));
                Ok(task)
            }
            Err(err) => Err(self.mutation_failed(MutationOp::Toggle, Some(id), err)),
        }
    }

    /// Send the fields present in `patch` and adopt the backend's record.
    pub async fn update(&self, id: TaskId, mut patch: TaskPatch) -> Result<Task, Failure> {
        if let Some(title) = patch.title.take() {
            let title = normalize_title(&title)
                .ok_or_else(|| Failure::Validation("title cannot be empty".to_string()))?;
            patch.title = Some(title);
        }

        let _intent = self.inner.intents.lock().await;
        let current = self.ensure_present(MutationOp::Update, id)?;
        if patch.is_empty() {
            return Ok(current);
        }
        tracing::debug!(id, ?patch, "update");

        match self.inner.client.update(id, patch).await {
            Ok(task) => {
                self.inner.state().replace(task.clone());
                self.inner.notifier.success("Task updated!", Some(id));
                Ok(task)
            }
            Err(err) => Err(self.mutation_failed(MutationOp::Update, Some(id), err)),
        }
    }

    /// Remove a task now and delete it from the backend once the undo
    /// window elapses, unless it is restored first.
    pub async fn remove(&self, id: TaskId) -> Result<Task, Failure> {
        let _intent = self.inner.intents.lock().await;
        let token = CancellationToken::new();
        let (task, seq) = {
            let mut state = self.inner.state();
            let Some(index) = state.position(id) else {
                drop(state);
                return Err(self.reject(MutationOp::Delete, Failure::NotFound(id)));
            };
            let task = state.tasks.remove(index);
            let seq = state.next_seq;
            state.next_seq += 1;
            state.pending.push(PendingRemoval {
                seq,
                task: task.clone(),
                token: token.clone(),
            });
            state.undo_slot = Some(seq);
            (task, seq)
        };
        tracing::debug!(id, seq, "remove");

        self.spawn_purge_timer(seq, token);
        self.inner.notifier.undoable("Task deleted", id);
        Ok(task)
    }

    /// Restore the current undo target, if any.
    pub async fn undo(&self) -> Option<Task> {
        let _intent = self.inner.intents.lock().await;
        let restored = {
            let mut state = self.inner.state();
            let seq = state.undo_target(self.inner.settings.undo_policy)?;
            restore(&mut state, seq)?
        };
        self.announce_restored(restored)
    }

    /// Restore a specific pending removal by task id.
    pub async fn undo_task(&self, id: TaskId) -> Option<Task> {
        let _intent = self.inner.intents.lock().await;
        let restored = {
            let mut state = self.inner.state();
            let seq = state
                .pending
                .iter()
                .rev()
                .find(|pending| pending.task.id == id)
                .map(|pending| pending.seq)?;
            restore(&mut state, seq)?
        };
        self.announce_restored(restored)
    }

    pub fn set_filter(&self, filter: PriorityFilter) {
        self.inner.state().filter = filter;
    }

    pub fn filter(&self) -> PriorityFilter {
        self.inner.state().filter
    }

    pub fn filtered_view(&self, completed: bool, filter: PriorityFilter) -> Vec<Task> {
        view::filtered_view(&self.inner.state().tasks, completed, filter)
    }

    /// Active and completed views under the current filter.
    pub fn views(&self) -> TaskViews {
        let state = self.inner.state();
        view::project(&state.tasks, state.filter)
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.inner.state().tasks.clone()
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        let state = self.inner.state();
        state.position(id).map(|index| state.tasks[index].clone())
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.inner.state();
        let undo_target = state
            .undo_target(self.inner.settings.undo_policy)
            .and_then(|seq| state.pending.iter().find(|pending| pending.seq == seq))
            .map(|pending| pending.task.id);
        StoreSnapshot {
            tasks: state.tasks.clone(),
            loading: state.loading,
            error: state.error.clone(),
            filter: state.filter,
            undo_target,
            pending_removals: state.pending.iter().map(|pending| pending.task.id).collect(),
        }
    }

    /// Wait until every removal timer has finished, including the backend
    /// delete of timers that fired.
    pub async fn settle(&self) {
        self.inner.timers.close();
        self.inner.timers.wait().await;
        self.inner.timers.reopen();
    }

    /// Resolve removals still inside their undo window according to the
    /// shutdown policy. Returns how many were resolved.
    pub async fn shutdown(&self) -> usize {
        let drained: Vec<PendingRemoval> = {
            let _intent = self.inner.intents.lock().await;
            let mut state = self.inner.state();
            state.undo_slot = None;
            let drained: Vec<PendingRemoval> = state.pending.drain(..).collect();
            if self.inner.settings.shutdown_policy == ShutdownPolicy::Purge {
                state
                    .purging
                    .extend(drained.iter().map(|pending| pending.task.id));
            }
            drained
        };
        for pending in &drained {
            pending.token.cancel();
        }

        match self.inner.settings.shutdown_policy {
            ShutdownPolicy::Purge => {
                for pending in &drained {
                    self.inner.purge(pending.task.id).await;
                }
            }
            ShutdownPolicy::Discard => {
                for pending in &drained {
                    tracing::info!(id = pending.task.id, "pending delete discarded at shutdown");
                }
            }
        }

        self.settle().await;
        drained.len()
    }

    fn spawn_purge_timer(&self, seq: u64, token: CancellationToken) {
        let inner = Arc::clone(&self.inner);
        let window = self.inner.settings.undo_window();
        self.inner.timers.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(window) => {}
            }
            // Undo may have claimed the entry between the wake-up and here.
            let Some(id) = inner.state().claim(seq) else {
                return;
            };
            inner.purge(id).await;
        });
    }

    fn ensure_present(&self, op: MutationOp, id: TaskId) -> Result<Task, Failure> {
        let found = self.get(id);
        found.ok_or_else(|| self.reject(op, Failure::NotFound(id)))
    }

    fn reject(&self, op: MutationOp, failure: Failure) -> Failure {
        let id = match &failure {
            Failure::NotFound(id) => Some(*id),
            _ => None,
        };
        tracing::debug!(%op, %failure, "intent rejected");
        self.inner.notifier.error(op.failure_message(), id);
        failure
    }

    fn mutation_failed(&self, op: MutationOp, id: Option<TaskId>, err: Error) -> Failure {
        tracing::warn!(%op, ?id, error = %err, "backend call failed");
        self.inner.notifier.error(op.failure_message(), id);
        Failure::Mutation {
            op,
            message: err.to_string(),
        }
    }

    fn announce_restored(&self, task: Task) -> Option<Task> {
        tracing::debug!(id = task.id, "restored");
        self.inner.notifier.success("Task restored", Some(task.id));
        Some(task)
    }
}

fn restore(state: &mut StoreState, seq: u64) -> Option<Task> {
    let pending = state.take_pending(seq)?;
    pending.token.cancel();
    state.tasks.retain(|task| task.id != pending.task.id);
    state.tasks.insert(0, pending.task.clone());
    Some(pending.task)
}
