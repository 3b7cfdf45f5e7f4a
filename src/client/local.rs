//! Local fallback store.
//!
//! All tasks live in one JSON array under a fixed namespace:
//!
//! ```text
//! <data_dir>/taskflow/
//!   tasks.json        # serialized task array
//!   tasks.json.lock   # fs2 lock held for every read-modify-write
//! ```
//!
//! When `tasks.json` is missing it is seeded from the built-in dataset and
//! written back before the first operation runs.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{collection, TaskClient};
use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::task::{Task, TaskDraft, TaskId, TaskPatch};

/// Namespace directory inside the data dir
pub const NAMESPACE: &str = "taskflow";

/// File holding the serialized task array
pub const TASKS_FILE: &str = "tasks.json";

#[derive(Debug, Clone)]
pub struct LocalClient {
    path: PathBuf,
}

impl LocalClient {
    /// Store backed by `<data_dir>/taskflow/tasks.json`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(NAMESPACE).join(TASKS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` against the stored tasks under the file lock, writing the
    /// collection back when `op` reports a change.
    async fn transact<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Vec<Task>) -> Result<(T, bool)> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || transact_blocking(&path, op))
            .await
            .map_err(|err| Error::OperationFailed(format!("local store worker failed: {err}")))?
    }
}

fn transact_blocking<T, F>(path: &Path, op: F) -> Result<T>
where
    F: FnOnce(&mut Vec<Task>) -> Result<(T, bool)>,
{
    let lock_path = PathBuf::from(format!("{}.lock", path.display()));
    let _lock = FileLock::acquire(&lock_path, DEFAULT_LOCK_TIMEOUT_MS)?;

    let mut tasks = read_or_seed(path)?;
    let (output, dirty) = op(&mut tasks)?;
    if dirty {
        write_tasks(path, &tasks)?;
    }
    Ok(output)
}

fn read_or_seed(path: &Path) -> Result<Vec<Task>> {
    if !path.exists() {
        let seeded = collection::seed_tasks()?;
        write_tasks(path, &seeded)?;
        tracing::debug!(path = %path.display(), count = seeded.len(), "seeded local task store");
        return Ok(seeded);
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&content)?)
}

fn write_tasks(path: &Path, tasks: &[Task]) -> Result<()> {
    let json = serde_json::to_string_pretty(tasks)?;
    lock::write_atomic(path, json.as_bytes())
}

#[async_trait]
impl TaskClient for LocalClient {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn get_all(&self) -> Result<Vec<Task>> {
        self.transact(|tasks| Ok((collection::newest_first(tasks), false)))
            .await
    }

    async fn get_by_id(&self, id: TaskId) -> Result<Option<Task>> {
        self.transact(move |tasks| Ok((collection::find(tasks, id), false)))
            .await
    }

    async fn create(&self, draft: TaskDraft) -> Result<Task> {
        self.transact(move |tasks| {
            let id = collection::next_id(tasks);
            Ok((collection::create(tasks, id, draft), true))
        })
        .await
    }

    async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<Task> {
        self.transact(move |tasks| Ok((collection::update(tasks, id, &patch)?, true)))
            .await
    }

    async fn delete(&self, id: TaskId) -> Result<()> {
        self.transact(move |tasks| Ok((collection::delete(tasks, id)?, true)))
            .await
    }

    async fn toggle_complete(&self, id: TaskId) -> Result<Task> {
        self.transact(move |tasks| Ok((collection::toggle(tasks, id)?, true)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalClient) {
        let temp = TempDir::new().unwrap();
        let client = LocalClient::in_dir(temp.path());
        (temp, client)
    }

    #[tokio::test]
    async fn first_access_seeds_and_writes_back() {
        let (temp, client) = setup();
        let expected = temp.path().join(NAMESPACE).join(TASKS_FILE);
        assert_eq!(client.path(), expected.as_path());
        assert!(!expected.exists());

        let tasks = client.get_all().await.unwrap();
        assert_eq!(tasks.len(), 5);
        assert_eq!(tasks[0].id, 5);
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn create_assigns_max_plus_one() {
        let (_temp, client) = setup();
        let task = client.create(TaskDraft::new("Buy milk")).await.unwrap();
        assert_eq!(task.id, 6);
        assert_eq!(task.priority, Priority::Medium);
        assert!(!task.completed);

        client.delete(6).await.unwrap();
        client.delete(5).await.unwrap();
        let next = client.create(TaskDraft::new("Again")).await.unwrap();
        assert_eq!(next.id, 5);
    }

    #[tokio::test]
    async fn changes_persist_across_instances() {
        let temp = TempDir::new().unwrap();
        let first = LocalClient::in_dir(temp.path());
        first
            .update(2, TaskPatch::default().title("Call the dentist"))
            .await
            .unwrap();
        first.toggle_complete(1).await.unwrap();

        let second = LocalClient::in_dir(temp.path());
        let two = second.get_by_id(2).await.unwrap().expect("task 2");
        assert_eq!(two.title, "Call the dentist");
        let one = second.get_by_id(1).await.unwrap().expect("task 1");
        assert!(one.completed);
        assert!(one.completed_at.is_some());
    }

    #[tokio::test]
    async fn toggle_twice_clears_completed_at() {
        let (_temp, client) = setup();
        let done = client.toggle_complete(2).await.unwrap();
        assert!(done.completed && done.completed_at.is_some());
        let reopened = client.toggle_complete(2).await.unwrap();
        assert!(!reopened.completed);
        assert!(reopened.completed_at.is_none());
    }

    #[tokio::test]
    async fn missing_ids_are_reported() {
        let (_temp, client) = setup();
        assert!(client.get_by_id(99).await.unwrap().is_none());
        assert!(matches!(
            client.toggle_complete(99).await,
            Err(Error::TaskNotFound(99))
        ));
        assert!(matches!(client.delete(99).await, Err(Error::TaskNotFound(99))));
    }

    #[tokio::test]
    async fn empty_file_is_an_empty_store() {
        let (_temp, client) = setup();
        fs::create_dir_all(client.path().parent().unwrap()).unwrap();
        fs::write(client.path(), "").unwrap();
        assert!(client.get_all().await.unwrap().is_empty());
        let task = client.create(TaskDraft::new("First")).await.unwrap();
        assert_eq!(task.id, 1);
    }
}
