use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

/// Temp workspace with a local-backend config and a short undo window.
fn workspace() -> (TempDir, PathBuf) {
    let temp = TempDir::new().expect("tempdir");
    let data_dir = temp.path().join("data");
    let config = temp.path().join("taskflow.toml");
    fs::write(
        &config,
        format!(
            "[backend]\nkind = \"local\"\n\n[backend.local]\ndata_dir = {:?}\n\n[store]\nundo_window_ms = 50\n",
            data_dir.display().to_string()
        ),
    )
    .expect("write config");
    (temp, config)
}

fn taskflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("taskflow").expect("binary");
    cmd.current_dir(dir)
        .env_remove("TASKFLOW_CONFIG")
        .env_remove("TASKFLOW_BACKEND")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn taskflow_help_works() {
    let temp = TempDir::new().expect("tempdir");
    taskflow(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("personal task manager"));
}

#[test]
fn subcommand_help_works() {
    let temp = TempDir::new().expect("tempdir");
    for cmd in ["list", "add", "toggle", "edit", "rm", "shell"] {
        taskflow(temp.path()).arg(cmd).arg("--help").assert().success();
    }
}

#[test]
fn memory_list_emits_json_envelope() {
    let temp = TempDir::new().expect("tempdir");
    taskflow(temp.path())
        .args(["--backend", "memory", "--json", "list", "--all"])
        .assert()
        .success()
        .stdout(contains("\"schema_version\": \"taskflow.v1\""))
        .stdout(contains("\"command\": \"list\""))
        .stdout(contains("Review quarterly goals"))
        .stdout(contains("Water the plants"));
}

#[test]
fn list_filters_by_priority() {
    let temp = TempDir::new().expect("tempdir");
    taskflow(temp.path())
        .args(["--backend", "memory", "list", "--priority", "low"])
        .assert()
        .success()
        .stdout(contains("Renew library books"))
        .stdout(contains("Review quarterly goals").not());
}

#[test]
fn local_round_trip_add_toggle_edit_rm() {
    let (temp, config) = workspace();
    let config = config.to_str().expect("utf-8 path");

    taskflow(temp.path())
        .args(["--config", config, "--json", "add", "Buy", "milk"])
        .assert()
        .success()
        .stdout(contains("\"id\": 6"))
        .stdout(contains("Task added successfully!"));

    taskflow(temp.path())
        .args(["--config", config, "toggle", "6"])
        .assert()
        .success()
        .stdout(contains("Task completed!"));

    taskflow(temp.path())
        .args(["--config", config, "edit", "6", "--priority", "high", "--due", "2026-10-20"])
        .assert()
        .success()
        .stdout(contains("Task updated!"));

    taskflow(temp.path())
        .args(["--config", config, "--json", "list", "--completed"])
        .assert()
        .success()
        .stdout(contains("\"priority\": \"high\""))
        .stdout(contains("\"due_date\": \"2026-10-20\""));

    taskflow(temp.path())
        .args(["--config", config, "rm", "6"])
        .assert()
        .success()
        .stdout(contains("deleted"));

    taskflow(temp.path())
        .args(["--config", config, "list", "--all"])
        .assert()
        .success()
        .stdout(contains("Buy milk").not());
}

#[test]
fn rm_no_wait_purges_immediately() {
    let (temp, config) = workspace();
    let config = config.to_str().expect("utf-8 path");

    taskflow(temp.path())
        .args(["--config", config, "--json", "rm", "3", "--no-wait"])
        .assert()
        .success()
        .stdout(contains("\"outcome\": \"deleted\""));

    taskflow(temp.path())
        .args(["--config", config, "list", "--all"])
        .assert()
        .success()
        .stdout(contains("Water the plants").not());
}

#[test]
fn unknown_task_is_a_user_error() {
    let temp = TempDir::new().expect("tempdir");
    taskflow(temp.path())
        .args(["--backend", "memory", "toggle", "99"])
        .assert()
        .code(2)
        .stderr(contains("Task not found: 99"));
}

#[test]
fn json_errors_use_the_envelope() {
    let temp = TempDir::new().expect("tempdir");
    taskflow(temp.path())
        .args(["--backend", "memory", "--json", "edit", "1"])
        .assert()
        .code(2)
        .stdout(contains("\"status\": \"error\""))
        .stdout(contains("\"kind\": \"user_error\""));
}

#[test]
fn invalid_config_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    fs::write(
        temp.path().join(".taskflow.toml"),
        "[store]\nundo_window_ms = 0\n",
    )
    .expect("write config");

    taskflow(temp.path())
        .arg("list")
        .assert()
        .code(2)
        .stderr(contains("undo_window_ms"));
}

#[test]
fn events_are_written_as_jsonl() {
    let temp = TempDir::new().expect("tempdir");
    let events = temp.path().join("events.jsonl");

    taskflow(temp.path())
        .args(["--backend", "memory", "--events"])
        .arg(&events)
        .args(["add", "Buy milk"])
        .assert()
        .success();

    let content = fs::read_to_string(&events).expect("events file");
    let line = content.lines().next().expect("one event");
    let value: serde_json::Value = serde_json::from_str(line).expect("json line");
    assert_eq!(value["schema_version"], "taskflow.event.v1");
    assert_eq!(value["kind"], "success");
    assert_eq!(value["message"], "Task added successfully!");
    assert_eq!(value["task_id"], 6);
}

#[test]
fn shell_supports_undo() {
    let temp = TempDir::new().expect("tempdir");
    taskflow(temp.path())
        .args(["--backend", "memory", "shell"])
        .write_stdin("add Buy milk\nrm 6\nundo\nls\nquit\n")
        .assert()
        .success()
        .stdout(contains("Task added successfully!"))
        .stdout(contains("Task deleted (type 'undo' to restore)"))
        .stdout(contains("Task restored"))
        .stdout(contains("Buy milk"));
}
