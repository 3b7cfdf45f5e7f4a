//! One-shot task commands: list, add, toggle, edit, rm.

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::cli::{GlobalOptions, Session};
use crate::error::{Error, Result};
use crate::events::{Notification, NotificationKind};
use crate::output::{emit_success, HumanOutput};
use crate::task::{due_label, parse_due_date, Priority, PriorityFilter, Task, TaskId, TaskPatch};
use crate::view;

pub struct ListOptions {
    pub priority: String,
    pub completed: bool,
    pub all: bool,
    pub global: GlobalOptions,
}

pub struct AddOptions {
    pub title: String,
    pub global: GlobalOptions,
}

pub struct ToggleOptions {
    pub id: TaskId,
    pub global: GlobalOptions,
}

pub struct EditOptions {
    pub id: TaskId,
    pub title: Option<String>,
    pub priority: Option<String>,
    pub due: Option<String>,
    pub clear_due: bool,
    pub global: GlobalOptions,
}

pub struct RmOptions {
    pub id: TaskId,
    pub no_wait: bool,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct ListOutput {
    filter: PriorityFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    active: Option<Vec<Task>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed: Option<Vec<Task>>,
}

#[derive(Serialize)]
struct TaskOutput {
    task: Task,
    notifications: Vec<Notification>,
}

#[derive(Serialize)]
struct RemoveOutput {
    task: Task,
    /// "deleted", "pending" (discarded at exit) or "restored"
    outcome: &'static str,
    notifications: Vec<Notification>,
}

pub async fn run_list(options: ListOptions) -> Result<()> {
    let filter: PriorityFilter = options.priority.parse()?;
    let session = Session::loaded(&options.global).await?;
    session.store.set_filter(filter);
    let views = session.store.views();

    let show_active = !options.completed;
    let show_completed = options.completed || options.all;
    let today = Local::now().date_naive();

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Filter", filter.to_string());
    if show_active {
        let lines = if views.active.is_empty() {
            vec![view::empty_message(filter)]
        } else {
            views.active.iter().map(|task| task_line(task, today)).collect()
        };
        human.push_section(format!("Active ({})", views.active.len()), lines);
    }
    if show_completed {
        human.push_section(
            views.completed_summary(),
            views
                .completed
                .iter()
                .map(|task| task_line(task, today))
                .collect(),
        );
    }

    let output = ListOutput {
        filter,
        active: show_active.then(|| views.active.clone()),
        completed: show_completed.then(|| views.completed.clone()),
    };
    emit_success(session.output, "list", &output, Some(&human))
}

pub async fn run_add(options: AddOptions) -> Result<()> {
    let mut session = Session::loaded(&options.global).await?;
    let added = session.store.add(&options.title).await;
    let (notifications, warnings) = session.drain();
    let task = added?;

    let mut human = task_report(&task, &notifications, warnings);
    human.push_next_step(format!("taskflow toggle {}", task.id));
    emit_success(
        session.output,
        "add",
        &TaskOutput {
            task,
            notifications,
        },
        Some(&human),
    )
}

pub async fn run_toggle(options: ToggleOptions) -> Result<()> {
    let mut session = Session::loaded(&options.global).await?;
    let toggled = session.store.toggle(options.id).await;
    let (notifications, warnings) = session.drain();
    let task = toggled?;

    let human = task_report(&task, &notifications, warnings);
    emit_success(
        session.output,
        "toggle",
        &TaskOutput {
            task,
            notifications,
        },
        Some(&human),
    )
}

pub async fn run_edit(options: EditOptions) -> Result<()> {
    let patch = build_patch(
        options.title,
        options.priority.as_deref(),
        options.due.as_deref(),
        options.clear_due,
    )?;
    if patch.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to change (use --title, --priority, --due or --clear-due)".to_string(),
        ));
    }

    let mut session = Session::loaded(&options.global).await?;
    let updated = session.store.update(options.id, patch).await;
    let (notifications, warnings) = session.drain();
    let task = updated?;

    let human = task_report(&task, &notifications, warnings);
    emit_success(
        session.output,
        "edit",
        &TaskOutput {
            task,
            notifications,
        },
        Some(&human),
    )
}

pub async fn run_rm(options: RmOptions) -> Result<()> {
    let mut session = Session::loaded(&options.global).await?;
    let store = session.store.clone();
    let removed = store.remove(options.id).await;
    if removed.is_err() {
        session.drain();
    }
    let task = removed?;

    let outcome = if options.no_wait {
        store.shutdown().await;
        shutdown_outcome(&store)
    } else {
        if !session.output.quiet && !session.output.json {
            eprintln!(
                "Task deleted. Press Ctrl-C within {}s to undo.",
                store.settings().undo_window().as_secs_f32()
            );
        }
        tokio::select! {
            _ = store.settle() => "deleted",
            _ = tokio::signal::ctrl_c() => {
                match store.undo_task(task.id).await {
                    Some(_) => "restored",
                    None => {
                        store.settle().await;
                        "deleted"
                    }
                }
            }
        }
    };

    let (notifications, warnings) = session.drain();
    if let Some(failed) = notifications
        .iter()
        .find(|notification| notification.kind == NotificationKind::Error)
    {
        return Err(Error::OperationFailed(failed.message.clone()));
    }

    let mut human = task_report(&task, &notifications, warnings);
    human.push_summary("Outcome", outcome);
    emit_success(
        session.output,
        "rm",
        &RemoveOutput {
            task,
            outcome,
            notifications,
        },
        Some(&human),
    )
}

fn shutdown_outcome(store: &crate::store::TaskStore) -> &'static str {
    match store.settings().shutdown_policy {
        crate::config::ShutdownPolicy::Purge => "deleted",
        crate::config::ShutdownPolicy::Discard => "pending",
    }
}

/// Build a patch from edit flags. Only flags that were given are set.
pub(crate) fn build_patch(
    title: Option<String>,
    priority: Option<&str>,
    due: Option<&str>,
    clear_due: bool,
) -> Result<TaskPatch> {
    let mut patch = TaskPatch::default();
    if let Some(title) = title {
        patch = patch.title(title);
    }
    if let Some(priority) = priority {
        patch = patch.priority(priority.parse::<Priority>()?);
    }
    if let Some(due) = due {
        patch = patch.due_date(Some(parse_due_date(due)?));
    } else if clear_due {
        patch = patch.due_date(None);
    }
    Ok(patch)
}

/// One-line rendering: `[x]   3 Title (high, due Tomorrow)`.
pub(crate) fn task_line(task: &Task, today: NaiveDate) -> String {
    let mark = if task.completed { "x" } else { " " };
    let due = task
        .due_date
        .map(|due| format!(", due {}", due_label(due, today)))
        .unwrap_or_default();
    format!(
        "[{mark}] {:>3} {} ({}{due})",
        task.id, task.title, task.priority
    )
}

fn task_report(task: &Task, notifications: &[Notification], warnings: Vec<String>) -> HumanOutput {
    let header = notifications
        .last()
        .map(|notification| notification.message.clone())
        .unwrap_or_else(|| format!("Task {}", task.id));
    let mut human = HumanOutput::new(header);
    human.push_summary("ID", task.id.to_string());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Priority", task.priority.to_string());
    human.push_summary("Completed", task.completed.to_string());
    if let Some(due) = task.due_date {
        human.push_summary("Due", due.to_string());
    }
    for warning in warnings {
        human.push_warning(warning);
    }
    human
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDraft;
    use chrono::Utc;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn patch_only_carries_given_flags() {
        let patch = build_patch(None, Some("HIGH"), None, false).unwrap();
        assert_eq!(patch.priority, Some(Priority::High));
        assert!(patch.title.is_none());
        assert!(patch.due_date.is_none());

        let cleared = build_patch(None, None, None, true).unwrap();
        assert_eq!(cleared.due_date, Some(None));

        let dated = build_patch(Some("Pay rent".into()), None, Some("2026-11-01"), false).unwrap();
        assert_eq!(dated.due_date, Some(Some(date("2026-11-01"))));
        assert_eq!(dated.title.as_deref(), Some("Pay rent"));

        assert!(build_patch(None, None, None, false).unwrap().is_empty());
    }

    #[test]
    fn invalid_flags_are_user_errors() {
        assert!(matches!(
            build_patch(None, Some("urgent"), None, false),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            build_patch(None, None, Some("next week"), false),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn task_line_shows_mark_priority_and_due_label() {
        let today = date("2026-10-15");
        let mut draft = TaskDraft::new("Water plants");
        draft.priority = Priority::Low;
        draft.due_date = Some(date("2026-10-16"));
        let mut task = Task::from_draft(4, draft, Utc::now());
        assert_eq!(task_line(&task, today), "[ ]   4 Water plants (low, due Tomorrow)");

        task.set_completed(true, Utc::now());
        task.due_date = None;
        assert_eq!(task_line(&task, today), "[x]   4 Water plants (low)");
    }
}
