//! Several processes-worth of local clients sharing one data directory.

use std::collections::HashSet;

use taskflow::client::{LocalClient, TaskClient};
use taskflow::task::TaskDraft;
use tempfile::TempDir;

const WRITERS: usize = 8;
const TASKS_PER_WRITER: usize = 5;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_get_unique_ids() {
    let temp = TempDir::new().expect("tempdir");

    let mut handles = Vec::with_capacity(WRITERS);
    for writer in 0..WRITERS {
        let client = LocalClient::in_dir(temp.path());
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::with_capacity(TASKS_PER_WRITER);
            for n in 0..TASKS_PER_WRITER {
                let task = client
                    .create(TaskDraft::new(format!("writer {writer} task {n}")))
                    .await
                    .expect("create");
                ids.push(task.id);
            }
            ids
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.expect("join") {
            assert!(seen.insert(id), "duplicate id {id}");
        }
    }

    let stored = LocalClient::in_dir(temp.path()).get_all().await.expect("get_all");
    assert_eq!(stored.len(), 5 + WRITERS * TASKS_PER_WRITER);
    let stored_ids: HashSet<i64> = stored.iter().map(|task| task.id).collect();
    assert_eq!(stored_ids.len(), stored.len());
}
