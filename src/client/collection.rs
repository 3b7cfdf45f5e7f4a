//! Collection semantics shared by the local and in-memory clients.

use chrono::Utc;

use crate::error::{Error, Result};
use crate::task::{Task, TaskDraft, TaskId, TaskPatch};

/// Fixed initial dataset written on first access to an empty store.
const SEED_TASKS: &str = r#"[
  {"id": 1, "title": "Review quarterly goals", "completed": false, "priority": "high",
   "due_date": "2026-10-15", "created_at": "2026-10-01T09:00:00Z", "completed_at": null},
  {"id": 2, "title": "Schedule dentist appointment", "completed": false, "priority": "medium",
   "due_date": "2026-10-20", "created_at": "2026-10-02T10:30:00Z", "completed_at": null},
  {"id": 3, "title": "Water the plants", "completed": true, "priority": "low",
   "due_date": null, "created_at": "2026-10-03T08:15:00Z", "completed_at": "2026-10-03T18:00:00Z"},
  {"id": 4, "title": "Prepare slides for Monday standup", "completed": false, "priority": "high",
   "due_date": "2026-10-19", "created_at": "2026-10-05T14:45:00Z", "completed_at": null},
  {"id": 5, "title": "Renew library books", "completed": false, "priority": "low",
   "due_date": "2026-10-10", "created_at": "2026-10-06T16:20:00Z", "completed_at": null}
]"#;

pub(crate) fn seed_tasks() -> Result<Vec<Task>> {
    Ok(serde_json::from_str(SEED_TASKS)?)
}

pub(crate) fn newest_first(tasks: &[Task]) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by(|left, right| right.id.cmp(&left.id));
    sorted
}

pub(crate) fn next_id(tasks: &[Task]) -> TaskId {
    tasks.iter().map(|task| task.id).max().unwrap_or(0) + 1
}

pub(crate) fn find(tasks: &[Task], id: TaskId) -> Option<Task> {
    tasks.iter().find(|task| task.id == id).cloned()
}

pub(crate) fn create(tasks: &mut Vec<Task>, id: TaskId, draft: TaskDraft) -> Task {
    let task = Task::from_draft(id, draft, Utc::now());
    tasks.push(task.clone());
    task
}

pub(crate) fn update(tasks: &mut [Task], id: TaskId, patch: &TaskPatch) -> Result<Task> {
    let task = find_mut(tasks, id)?;
    task.apply_patch(patch);
    Ok(task.clone())
}

pub(crate) fn toggle(tasks: &mut [Task], id: TaskId) -> Result<Task> {
    let task = find_mut(tasks, id)?;
    let completed = !task.completed;
    task.set_completed(completed, Utc::now());
    Ok(task.clone())
}

pub(crate) fn delete(tasks: &mut Vec<Task>, id: TaskId) -> Result<()> {
    let before = tasks.len();
    tasks.retain(|task| task.id != id);
    if tasks.len() == before {
        return Err(Error::TaskNotFound(id));
    }
    Ok(())
}

fn find_mut(tasks: &mut [Task], id: TaskId) -> Result<&mut Task> {
    tasks
        .iter_mut()
        .find(|task| task.id == id)
        .ok_or(Error::TaskNotFound(id))
}
