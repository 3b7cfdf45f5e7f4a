//! Shared output formatting for taskflow commands.
//!
//! `--json` wraps every result in a versioned envelope; otherwise a short
//! human report is printed unless `--quiet` is set.

use serde::Serialize;

use crate::error::{Error, JsonError, Result};

pub const SCHEMA_VERSION: &str = "taskflow.v1";

/// Global flags that take a separate value argument.
const VALUE_FLAGS: [&str; 3] = ["--config", "--backend", "--events"];

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Human report: a header, `key: value` summary lines, then titled lists.
#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    sections: Vec<(String, Vec<String>)>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            sections: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    /// Titled block of lines, rendered after the summary in push order.
    pub fn push_section(&mut self, title: impl Into<String>, items: Vec<String>) {
        self.sections.push((title.into(), items));
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    next_steps: Vec<String>,
}

impl<T: Serialize> Envelope<'_, T> {
    fn print(&self) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        return Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data: Some(data),
            error: None,
            warnings: human.map(|h| h.warnings.clone()).unwrap_or_default(),
            next_steps: human.map(|h| h.next_steps.clone()).unwrap_or_default(),
        }
        .print();
    }

    if let (false, Some(human)) = (options.quiet, human) {
        println!("{}", format_human(human));
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        return Envelope::<()> {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            data: None,
            error: Some(JsonError::from(err)),
            warnings: Vec::new(),
            next_steps,
        }
        .print();
    }

    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = vec![output.header.clone()];

    if !output.summary.is_empty() {
        lines.push(String::new());
        lines.push("Summary:".to_string());
        lines.extend(output.summary.iter().map(|(key, value)| {
            if value.is_empty() {
                format!("- {key}")
            } else {
                format!("- {key}: {value}")
            }
        }));
    }
    for (title, items) in &output.sections {
        push_list(&mut lines, title, items);
    }
    push_list(&mut lines, "Warnings", &output.warnings);
    push_list(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

pub fn infer_command_name_from_args() -> String {
    infer_command_name(std::env::args().skip(1))
}

/// First positional argument, skipping global flags and their values.
pub fn infer_command_name(args: impl IntoIterator<Item = String>) -> String {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            args.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return arg;
    }
    "taskflow".to_string()
}

fn error_next_steps(err: &Error) -> Vec<String> {
    let step = match err {
        Error::TaskNotFound(_) => "taskflow list --all",
        Error::InvalidConfig(_) | Error::TomlParse(_) => "fix .taskflow.toml then retry",
        Error::Backend { .. } | Error::Http(_) => {
            "check backend.remote.base_url or retry with --backend local"
        }
        Error::LockFailed(_) => "retry once the other taskflow process exits",
        _ => return Vec::new(),
    };
    vec![step.to_string()]
}

fn push_list(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(format!("{title}:"));
    lines.extend(items.iter().map(|item| format!("- {item}")));
}
