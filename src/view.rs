//! Derived views over the task list.
//!
//! Everything here is a pure function of its input: the list is split into
//! active and completed tasks, optionally narrowed to one priority, and the
//! input order is preserved.

use serde::Serialize;

use crate::task::{PriorityFilter, Task};

/// The two partitions rendered by the front end.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TaskViews {
    pub filter: PriorityFilter,
    pub active: Vec<Task>,
    pub completed: Vec<Task>,
}

impl TaskViews {
    pub fn completed_summary(&self) -> String {
        format!("Completed ({})", self.completed.len())
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.completed.is_empty()
    }
}

/// Tasks with the given completion status that pass the priority filter.
pub fn filtered_view(tasks: &[Task], completed: bool, filter: PriorityFilter) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| task.completed == completed && filter.matches(task))
        .cloned()
        .collect()
}

pub fn project(tasks: &[Task], filter: PriorityFilter) -> TaskViews {
    TaskViews {
        filter,
        active: filtered_view(tasks, false, filter),
        completed: filtered_view(tasks, true, filter),
    }
}

/// Message shown when the active view is empty.
pub fn empty_message(filter: PriorityFilter) -> String {
    match filter {
        PriorityFilter::All => "No active tasks".to_string(),
        PriorityFilter::Only(priority) => format!("No {priority} priority tasks"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Priority, TaskDraft};
    use chrono::Utc;

    fn task(id: i64, title: &str, completed: bool, priority: Priority) -> Task {
        let mut draft = TaskDraft::new(title);
        draft.priority = priority;
        let mut task = Task::from_draft(id, draft, Utc::now());
        task.set_completed(completed, Utc::now());
        task
    }

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|task| task.id).collect()
    }

    #[test]
    fn scenario_two_tasks() {
        let tasks = vec![
            task(1, "A", false, Priority::Low),
            task(2, "B", true, Priority::High),
        ];

        assert_eq!(ids(&filtered_view(&tasks, false, PriorityFilter::All)), vec![1]);
        assert_eq!(
            ids(&filtered_view(&tasks, true, PriorityFilter::Only(Priority::High))),
            vec![2]
        );
        assert!(filtered_view(&tasks, false, PriorityFilter::Only(Priority::High)).is_empty());
    }

    #[test]
    fn keeps_input_order_and_input_untouched() {
        let tasks = vec![
            task(5, "e", false, Priority::High),
            task(4, "d", false, Priority::Low),
            task(3, "c", false, Priority::High),
            task(2, "b", true, Priority::High),
        ];
        let before = tasks.clone();

        let high = filtered_view(&tasks, false, PriorityFilter::Only(Priority::High));
        assert_eq!(ids(&high), vec![5, 3]);
        assert!(high.iter().all(|t| !t.completed && t.priority == Priority::High));
        assert_eq!(tasks, before);
    }

    #[test]
    fn project_splits_by_status() {
        let tasks = vec![
            task(3, "c", true, Priority::Low),
            task(2, "b", false, Priority::Medium),
            task(1, "a", true, Priority::Medium),
        ];
        let views = project(&tasks, PriorityFilter::Only(Priority::Medium));
        assert_eq!(ids(&views.active), vec![2]);
        assert_eq!(ids(&views.completed), vec![1]);
        assert_eq!(views.completed_summary(), "Completed (1)");
    }

    #[test]
    fn empty_messages() {
        assert_eq!(empty_message(PriorityFilter::All), "No active tasks");
        assert_eq!(
            empty_message(PriorityFilter::Only(Priority::Low)),
            "No low priority tasks"
        );
    }
}
