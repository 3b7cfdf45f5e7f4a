//! Notifications emitted by the task store, and their JSONL output.
//!
//! The store pushes a [`Notification`] onto an unbounded channel after every
//! state transition. Front ends render them as transient messages; the CLI
//! can also write them as JSON lines to stdout or a file.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::task::TaskId;

pub const EVENT_SCHEMA_VERSION: &str = "taskflow.event.v1";

/// Receiving end of the store's notification stream.
pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    /// Informational message carrying an undo affordance
    InfoWithUndo,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            task_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn for_task(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }
}

/// Sending side held by the store.
///
/// Sends never fail from the store's point of view: once the front end has
/// dropped its receiver, notifications are discarded.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn channel() -> (Self, NotificationReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::trace!("notification dropped: receiver closed");
        }
    }

    pub fn success(&self, message: impl Into<String>, id: Option<TaskId>) {
        self.send(with_task(Notification::new(NotificationKind::Success, message), id));
    }

    pub fn undoable(&self, message: impl Into<String>, id: TaskId) {
        self.send(Notification::new(NotificationKind::InfoWithUndo, message).for_task(id));
    }

    pub fn error(&self, message: impl Into<String>, id: Option<TaskId>) {
        self.send(with_task(Notification::new(NotificationKind::Error, message), id));
    }
}

fn with_task(notification: Notification, id: Option<TaskId>) -> Notification {
    match id {
        Some(id) => notification.for_task(id),
        None => notification,
    }
}

#[derive(Debug, Clone)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<EventSink> {
        match self {
            EventDestination::Stdout => Ok(EventSink::stdout()),
            EventDestination::File(path) => EventSink::file(path),
        }
    }
}

/// A notification wrapped with the event schema version.
#[derive(Debug, Clone, Serialize)]
pub struct Event<'a> {
    pub schema_version: &'static str,
    #[serde(flatten)]
    pub notification: &'a Notification,
}

/// Event sink that writes JSONL output to a destination.
pub struct EventSink {
    writer: Box<dyn Write + Send>,
}

impl EventSink {
    /// Emit events to stdout.
    pub fn stdout() -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
        }
    }

    /// Emit events to a file, creating it if necessary.
    pub fn file(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(file),
        })
    }

    /// Write a single notification as JSONL.
    pub fn emit(&mut self, notification: &Notification) -> Result<()> {
        let event = Event {
            schema_version: EVENT_SCHEMA_VERSION,
            notification,
        };
        let serialized = serde_json::to_vec(&event)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }
}
