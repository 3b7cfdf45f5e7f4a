//! taskflow - task management with optimistic updates and undo
//!
//! This library provides the core of the `taskflow` CLI: a task store that
//! serializes user intents against an async persistence backend, applies
//! backend responses to an in-memory list, and defers deletions behind an
//! undo window.
//!
//! # Core Concepts
//!
//! - **Task store**: the session's authoritative list, changed only by intents
//! - **Notifications**: transient success, undoable and error messages
//! - **Undo window**: removed tasks are deleted from the backend only after
//!   the window elapses without an undo
//! - **Views**: active and completed partitions under a priority filter
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `client`: Persistence clients (remote HTTP, local JSON file, memory)
//! - `config`: Configuration loading from `.taskflow.toml`
//! - `error`: Error types and result aliases
//! - `events`: Notification channel and JSONL event sink
//! - `lock`: File locking and atomic writes for the local store
//! - `output`: JSON envelope and human output
//! - `store`: The task store and its undo registry
//! - `task`: Task model, priorities, patches and due dates
//! - `view`: Filtered views over the task list

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod lock;
pub mod output;
pub mod store;
pub mod task;
pub mod view;

pub use error::{Error, Result};
pub use store::{Failure, TaskStore};
