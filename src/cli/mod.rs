//! Command-line interface for taskflow
//!
//! This module defines the CLI structure using clap derive macros.
//! One-shot commands live in `task`, the interactive loop in `shell`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::client;
use crate::config::{BackendKind, Config};
use crate::error::{Error, Result};
use crate::events::{EventDestination, EventSink, Notification, NotificationReceiver};
use crate::output::OutputOptions;
use crate::store::TaskStore;
use crate::task::TaskId;

mod shell;
mod task;

/// taskflow - a minimal personal task manager
///
/// Tasks are changed optimistically, deletions can be undone for a short
/// window, and the backend is a hosted API, a local JSON file or memory.
#[derive(Parser, Debug)]
#[command(name = "taskflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file (defaults to ./.taskflow.toml)
    #[arg(long, global = true, env = "TASKFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend override: local, remote, memory
    #[arg(long, global = true, env = "TASKFLOW_BACKEND")]
    pub backend: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Stream notifications as JSONL to a file, or "-" for stdout
    #[arg(long, global = true)]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List tasks (active by default)
    List {
        /// Priority filter: all, high, medium, low
        #[arg(short, long, default_value = "all")]
        priority: String,

        /// Show completed tasks instead of active ones
        #[arg(long, conflicts_with = "all")]
        completed: bool,

        /// Show active and completed tasks
        #[arg(long)]
        all: bool,
    },

    /// Add a task
    Add {
        /// Task title
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },

    /// Mark a task completed, or reopen it
    Toggle {
        /// Task ID
        id: TaskId,
    },

    /// Edit title, priority or due date
    Edit {
        /// Task ID
        id: TaskId,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New priority: high, medium, low
        #[arg(long)]
        priority: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
    },

    /// Delete a task (Ctrl-C during the undo window restores it)
    Rm {
        /// Task ID
        id: TaskId,

        /// Resolve the deletion now instead of waiting out the undo window
        #[arg(long)]
        no_wait: bool,
    },

    /// Interactive session with undo
    Shell,
}

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub backend: Option<String>,
    pub json: bool,
    pub quiet: bool,
    pub events: Option<String>,
}

impl GlobalOptions {
    fn events_to_stdout(&self) -> bool {
        matches!(
            EventDestination::parse(self.events.as_deref()),
            Some(EventDestination::Stdout)
        )
    }

    /// Output options, muted when notifications own stdout.
    pub fn output(&self) -> OutputOptions {
        let events_to_stdout = self.events_to_stdout();
        OutputOptions {
            json: self.json && !events_to_stdout,
            quiet: self.quiet || events_to_stdout,
        }
    }
}

/// Resolve the effective configuration: explicit file, else the working
/// directory's `.taskflow.toml`, then the backend override.
pub fn resolve_config(config: Option<&std::path::Path>, backend: Option<&str>) -> Result<Config> {
    let mut resolved = match config {
        Some(path) => {
            if !path.exists() {
                return Err(Error::InvalidConfig(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            Config::load(path)?
        }
        None => Config::load_from_dir(&std::env::current_dir()?)?,
    };
    if let Some(kind) = backend {
        resolved.backend.kind = kind.parse::<BackendKind>()?;
        resolved.validate()?;
    }
    tracing::debug!(backend = ?resolved.backend.kind, "configuration resolved");
    Ok(resolved)
}

/// A store wired to its backend, plus where notifications go.
pub(crate) struct Session {
    pub store: TaskStore,
    pub output: OutputOptions,
    notifications: NotificationReceiver,
    sink: Option<EventSink>,
}

impl Session {
    pub fn open(global: &GlobalOptions) -> Result<Self> {
        let config = resolve_config(global.config.as_deref(), global.backend.as_deref())?;
        let client = client::connect(&config.backend)?;
        let (store, notifications) = TaskStore::new(client, config.store);
        let sink = EventDestination::parse(global.events.as_deref())
            .map(|destination| destination.open())
            .transpose()?;
        Ok(Self {
            store,
            output: global.output(),
            notifications,
            sink,
        })
    }

    /// Open the session and load the task list.
    pub async fn loaded(global: &GlobalOptions) -> Result<Self> {
        let mut session = Self::open(global)?;
        let loaded = session.store.load().await;
        session.drain();
        loaded?;
        Ok(session)
    }

    /// Take queued notifications, forwarding each to the event sink.
    ///
    /// Sink failures come back as warnings.
    pub fn drain(&mut self) -> (Vec<Notification>, Vec<String>) {
        let mut drained = Vec::new();
        let mut warnings = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            if let Some(sink) = self.sink.as_mut() {
                if let Err(err) = sink.emit(&notification) {
                    warnings.push(format!("event output failed: {err}"));
                }
            }
            drained.push(notification);
        }
        (drained, warnings)
    }

    pub fn into_parts(self) -> (TaskStore, NotificationReceiver, Option<EventSink>) {
        (self.store, self.notifications, self.sink)
    }
}

impl Cli {
    pub fn global(&self) -> GlobalOptions {
        GlobalOptions {
            config: self.config.clone(),
            backend: self.backend.clone(),
            json: self.json,
            quiet: self.quiet,
            events: self.events.clone(),
        }
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.dispatch())
    }

    async fn dispatch(self) -> Result<()> {
        let global = self.global();
        match self.command {
            Commands::List {
                priority,
                completed,
                all,
            } => {
                task::run_list(task::ListOptions {
                    priority,
                    completed,
                    all,
                    global,
                })
                .await
            }
            Commands::Add { title } => {
                task::run_add(task::AddOptions {
                    title: title.join(" "),
                    global,
                })
                .await
            }
            Commands::Toggle { id } => task::run_toggle(task::ToggleOptions { id, global }).await,
            Commands::Edit {
                id,
                title,
                priority,
                due,
                clear_due,
            } => {
                task::run_edit(task::EditOptions {
                    id,
                    title,
                    priority,
                    due,
                    clear_due,
                    global,
                })
                .await
            }
            Commands::Rm { id, no_wait } => {
                task::run_rm(task::RmOptions {
                    id,
                    no_wait,
                    global,
                })
                .await
            }
            Commands::Shell => shell::run(global).await,
        }
    }
}
