//! Interactive task shell.
//!
//! Reads one intent per line from stdin and keeps a single store alive for
//! the whole session, so deletions can be undone inside their window.
//! Notifications are printed by a forwarder task as they arrive, which is
//! how deferred-delete failures surface after the command that caused them.
//! Quitting, end of input and Ctrl-C all leave through `TaskStore::shutdown`.

use std::future::Future;

use chrono::Local;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cli::task::{build_patch, task_line};
use crate::cli::{GlobalOptions, Session};
use crate::error::{Error, Result};
use crate::events::{EventSink, Notification, NotificationKind, NotificationReceiver};
use crate::store::TaskStore;
use crate::task::{PriorityFilter, TaskId, TaskPatch};
use crate::view;

const HELP: &str = "\
commands:
  ls                         show tasks under the current filter
  add <title...>             add a task
  toggle <id>                complete or reopen a task
  edit <id> title <text...>  rename a task
  edit <id> priority <p>     set priority (high, medium, low)
  edit <id> due <date|none>  set or clear the due date (YYYY-MM-DD)
  rm <id>                    delete a task (undoable for a few seconds)
  undo [id]                  restore the last deleted task, or a given one
  filter <all|high|medium|low>
  reload                     fetch tasks from the backend again
  help                       show this help
  quit                       leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ShellCommand {
    List,
    Add(String),
    Toggle(TaskId),
    Edit(TaskId, TaskPatch),
    Remove(TaskId),
    Undo(Option<TaskId>),
    Filter(PriorityFilter),
    Reload,
    Help,
    Quit,
}

impl ShellCommand {
    /// Parse one input line. Blank lines parse to `None`.
    pub(crate) fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match verb.to_ascii_lowercase().as_str() {
            "ls" | "list" => ShellCommand::List,
            "add" => ShellCommand::Add(rest.join(" ")),
            "toggle" | "done" => ShellCommand::Toggle(parse_id(rest.first())?),
            "edit" => parse_edit(&rest)?,
            "rm" | "delete" => ShellCommand::Remove(parse_id(rest.first())?),
            "undo" => match rest.first() {
                Some(_) => ShellCommand::Undo(Some(parse_id(rest.first())?)),
                None => ShellCommand::Undo(None),
            },
            "filter" => ShellCommand::Filter(rest.first().copied().unwrap_or("all").parse()?),
            "reload" => ShellCommand::Reload,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" | "q" => ShellCommand::Quit,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "unknown command '{other}' (try 'help')"
                )))
            }
        };
        Ok(Some(command))
    }
}

fn parse_id(raw: Option<&&str>) -> Result<TaskId> {
    let raw = raw.ok_or_else(|| Error::InvalidArgument("missing task id".to_string()))?;
    raw.parse()
        .map_err(|_| Error::InvalidArgument(format!("invalid task id '{raw}'")))
}

fn parse_edit(rest: &[&str]) -> Result<ShellCommand> {
    let id = parse_id(rest.first())?;
    let field = rest
        .get(1)
        .ok_or_else(|| Error::InvalidArgument("edit needs a field: title, priority, due".to_string()))?;
    let value = rest.get(2..).unwrap_or_default().join(" ");
    let patch = match field.to_ascii_lowercase().as_str() {
        "title" => build_patch(Some(value), None, None, false)?,
        "priority" => build_patch(None, Some(value.as_str()), None, false)?,
        "due" if value.eq_ignore_ascii_case("none") || value.is_empty() => {
            build_patch(None, None, None, true)?
        }
        "due" => build_patch(None, None, Some(value.as_str()), false)?,
        other => {
            return Err(Error::InvalidArgument(format!(
                "unknown field '{other}' (expected title, priority, due)"
            )))
        }
    };
    Ok(ShellCommand::Edit(id, patch))
}

pub async fn run(global: GlobalOptions) -> Result<()> {
    let session = Session::open(&global)?;
    let quiet = session.output.quiet;
    let (store, notifications, sink) = session.into_parts();

    let stop = CancellationToken::new();
    let forwarder = spawn_forwarder(notifications, sink, !quiet, stop.clone());

    if let Err(failure) = store.load().await {
        println!("error: {failure} (type 'reload' to retry)");
    } else if !quiet {
        render(&store);
    }

    let input = BufReader::new(tokio::io::stdin());
    let exit = read_commands(&store, input, interrupted(), quiet).await;

    let resolved = store.shutdown().await;
    tracing::debug!(?exit, resolved, "shell closed");
    stop.cancel();
    forwarder
        .await
        .map_err(|err| Error::OperationFailed(format!("notification forwarder failed: {err}")))?;
    exit.map(|_| ())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShellExit {
    Quit,
    EndOfInput,
    Interrupted,
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}

/// Run commands from `input` until quit, end of input or `interrupt`.
async fn read_commands<R, I>(
    store: &TaskStore,
    input: R,
    interrupt: I,
    quiet: bool,
) -> Result<ShellExit>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            _ = &mut interrupt => {
                println!();
                return Ok(ShellExit::Interrupted);
            }
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => return Ok(ShellExit::EndOfInput),
            },
        };
        let command = match ShellCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("error: {err}");
                continue;
            }
        };
        tracing::debug!(?command, "shell command");
        if command == ShellCommand::Quit {
            return Ok(ShellExit::Quit);
        }
        execute(store, command, quiet).await;
    }
}

async fn execute(store: &TaskStore, command: ShellCommand, quiet: bool) {
    let outcome = match command {
        ShellCommand::List => {
            render(store);
            Ok(())
        }
        ShellCommand::Add(title) => store.add(&title).await.map(|_| ()),
        ShellCommand::Toggle(id) => store.toggle(id).await.map(|_| ()),
        ShellCommand::Edit(id, patch) => store.update(id, patch).await.map(|_| ()),
        ShellCommand::Remove(id) => store.remove(id).await.map(|_| ()),
        ShellCommand::Undo(target) => {
            let restored = match target {
                Some(id) => store.undo_task(id).await,
                None => store.undo().await,
            };
            if restored.is_none() {
                println!("nothing to undo");
            }
            Ok(())
        }
        ShellCommand::Filter(filter) => {
            store.set_filter(filter);
            if !quiet {
                render(store);
            }
            Ok(())
        }
        ShellCommand::Reload => store.load().await.map(|_| ()),
        ShellCommand::Help => {
            println!("{HELP}");
            Ok(())
        }
        ShellCommand::Quit => Ok(()),
    };
    if let Err(failure) = outcome {
        println!("error: {failure}");
    }
}

fn render(store: &TaskStore) {
    let snapshot = store.snapshot();
    if let Some(error) = &snapshot.error {
        println!("error: {error} (type 'reload' to retry)");
        return;
    }

    let views = store.views();
    let today = Local::now().date_naive();
    println!("Active ({}):", views.active.len());
    if views.active.is_empty() {
        println!("  {}", view::empty_message(views.filter));
    }
    for task in &views.active {
        println!("  {}", task_line(task, today));
    }
    println!("{}:", views.completed_summary());
    for task in &views.completed {
        println!("  {}", task_line(task, today));
    }
}

fn spawn_forwarder(
    mut notifications: NotificationReceiver,
    mut sink: Option<EventSink>,
    print: bool,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = notifications.recv() => match received {
                    Some(notification) => forward(&notification, sink.as_mut(), print),
                    None => return,
                },
                _ = stop.cancelled() => break,
            }
        }
        while let Ok(notification) = notifications.try_recv() {
            forward(&notification, sink.as_mut(), print);
        }
    })
}

fn forward(notification: &Notification, sink: Option<&mut EventSink>, print: bool) {
    if let Some(sink) = sink {
        if let Err(err) = sink.emit(notification) {
            tracing::warn!(error = %err, "event output failed");
        }
    }
    if !print {
        return;
    }
    match notification.kind {
        NotificationKind::Success => println!("* {}", notification.message),
        NotificationKind::InfoWithUndo => {
            println!("* {} (type 'undo' to restore)", notification.message)
        }
        NotificationKind::Error => println!("! {}", notification.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryClient;
    use crate::config::StoreSettings;
    use crate::task::{Priority, Task, TaskDraft};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    async fn loaded_store() -> (TaskStore, Arc<MemoryClient>, NotificationReceiver) {
        let tasks = vec![
            Task::from_draft(1, TaskDraft::new("A"), chrono::Utc::now()),
            Task::from_draft(2, TaskDraft::new("B"), chrono::Utc::now()),
        ];
        let client = Arc::new(MemoryClient::with_tasks(tasks));
        let (store, rx) = TaskStore::new(client.clone(), StoreSettings::default());
        store.load().await.unwrap();
        (store, client, rx)
    }

    fn parse(line: &str) -> ShellCommand {
        ShellCommand::parse(line).unwrap().expect("command")
    }

    #[test]
    fn parses_core_intents() {
        assert_eq!(parse("ls"), ShellCommand::List);
        assert_eq!(parse("add  Buy   milk "), ShellCommand::Add("Buy milk".to_string()));
        assert_eq!(parse("toggle 3"), ShellCommand::Toggle(3));
        assert_eq!(parse("rm 2"), ShellCommand::Remove(2));
        assert_eq!(parse("undo"), ShellCommand::Undo(None));
        assert_eq!(parse("undo 2"), ShellCommand::Undo(Some(2)));
        assert_eq!(
            parse("filter HIGH"),
            ShellCommand::Filter(PriorityFilter::Only(Priority::High))
        );
        assert_eq!(parse("filter"), ShellCommand::Filter(PriorityFilter::All));
        assert_eq!(parse("quit"), ShellCommand::Quit);
        assert!(ShellCommand::parse("   ").unwrap().is_none());
    }

    #[test]
    fn parses_edit_fields() {
        assert_eq!(
            parse("edit 4 title Call the dentist"),
            ShellCommand::Edit(4, TaskPatch::default().title("Call the dentist"))
        );
        assert_eq!(
            parse("edit 4 priority low"),
            ShellCommand::Edit(4, TaskPatch::default().priority(Priority::Low))
        );
        assert_eq!(
            parse("edit 4 due none"),
            ShellCommand::Edit(4, TaskPatch::default().due_date(None))
        );
        assert!(matches!(parse("edit 4 due 2026-10-20"), ShellCommand::Edit(4, patch) if patch.due_date.is_some()));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(ShellCommand::parse("toggle").is_err());
        assert!(ShellCommand::parse("toggle abc").is_err());
        assert!(ShellCommand::parse("edit 4 colour red").is_err());
        assert!(ShellCommand::parse("frobnicate").is_err());
        assert!(ShellCommand::parse("filter urgent").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn ctrl_c_leaves_pending_removals_for_shutdown() {
        let (store, client, _rx) = loaded_store().await;
        let (mut writer, reader) = tokio::io::duplex(64);
        writer.write_all(b"rm 1\n").await.unwrap();

        let interrupt = tokio::time::sleep(Duration::from_millis(10));
        let exit = read_commands(&store, BufReader::new(reader), interrupt, true)
            .await
            .unwrap();
        assert_eq!(exit, ShellExit::Interrupted);
        assert_eq!(store.snapshot().pending_removals, vec![1]);
        assert!(client.deleted_ids().is_empty());

        assert_eq!(store.shutdown().await, 1);
        assert_eq!(client.deleted_ids(), vec![1]);
        drop(writer);
    }

    #[tokio::test]
    async fn quit_stops_reading_and_end_of_input_exits() {
        let (store, _client, _rx) = loaded_store().await;

        let input: &[u8] = b"toggle 1\nquit\nrm 2\n";
        let exit = read_commands(&store, input, std::future::pending(), true)
            .await
            .unwrap();
        assert_eq!(exit, ShellExit::Quit);
        assert!(store.get(1).unwrap().completed);
        assert!(store.get(2).is_some());

        let input: &[u8] = b"\nbogus\n";
        let exit = read_commands(&store, input, std::future::pending(), true)
            .await
            .unwrap();
        assert_eq!(exit, ShellExit::EndOfInput);
    }
}
