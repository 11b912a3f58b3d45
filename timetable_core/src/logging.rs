//! Per-run event sink.
//!
//! A [`RunLogger`] is created for one pipeline run and handed to every stage
//! that needs it. Each event goes to the `log` facade and, when the logger
//! has a directory, is appended as one JSON line to `run_main.log`. Raw
//! proposer replies go to `proposer_raw_responses.log` instead.
//!
//! Log files live in `<log_root>/<agent>/<run>/`.

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const MAIN_LOG_FILE: &str = "run_main.log";
pub const RAW_REPLY_LOG_FILE: &str = "proposer_raw_responses.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Milestone,
    Info,
    Warning,
    Error,
    FatalError,
}

impl EventKind {
    fn level(self) -> log::Level {
        match self {
            EventKind::Milestone | EventKind::Info => log::Level::Info,
            EventKind::Warning => log::Level::Warn,
            EventKind::Error | EventKind::FatalError => log::Level::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Milestone => "MILESTONE",
            EventKind::Info => "INFO",
            EventKind::Warning => "WARNING",
            EventKind::Error => "ERROR",
            EventKind::FatalError => "FATAL_ERROR",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event sink scoped to one agent within one run.
///
/// # Examples
///
/// ```
/// use timetable_core::logging::RunLogger;
///
/// let logger = RunLogger::console("fixer", "demo");
/// logger.info("Scanning batch_1 for violations");
/// assert!(logger.dir().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct RunLogger {
    agent: String,
    run: String,
    log_root: Option<PathBuf>,
    dir: Option<PathBuf>,
}

impl RunLogger {
    /// Logger writing under `<log_root>/<agent>/<run>/`. If the directory
    /// cannot be created the logger falls back to console-only output.
    pub fn new(agent: impl Into<String>, run: impl Into<String>, log_root: &Path) -> Self {
        let agent = agent.into();
        let run = run.into();
        let dir = log_root.join(&agent).join(&run);
        let dir = match fs::create_dir_all(&dir) {
            Ok(()) => Some(dir),
            Err(e) => {
                log::error!("Cannot create log directory {}: {}", dir.display(), e);
                None
            }
        };

        Self {
            agent,
            run,
            log_root: Some(log_root.to_path_buf()),
            dir,
        }
    }

    /// Logger that only forwards to the `log` facade.
    pub fn console(agent: impl Into<String>, run: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            run: run.into(),
            log_root: None,
            dir: None,
        }
    }

    /// Same run and log root, different agent.
    pub fn for_agent(&self, agent: &str) -> Self {
        match &self.log_root {
            Some(root) => RunLogger::new(agent, self.run.clone(), root),
            None => RunLogger::console(agent, self.run.clone()),
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn run(&self) -> &str {
        &self.run
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Records an event with a summary and optional structured payload.
    pub fn event(&self, kind: EventKind, summary: &str, data: Value) {
        log::log!(
            kind.level(),
            "[{}|{}] {}",
            self.agent.to_uppercase(),
            kind,
            summary
        );

        let Some(dir) = &self.dir else {
            return;
        };
        let mut payload = match data {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("details".to_string(), other);
                map
            }
        };
        payload.insert("summary".to_string(), Value::String(summary.to_string()));

        let record = json!({
            "timestamp": chrono::Local::now().to_rfc3339(),
            "type": kind,
            "data": payload,
        });
        append_line(&dir.join(MAIN_LOG_FILE), &record.to_string());
    }

    pub fn milestone(&self, summary: &str) {
        self.event(EventKind::Milestone, summary, Value::Null);
    }

    pub fn info(&self, summary: &str) {
        self.event(EventKind::Info, summary, Value::Null);
    }

    pub fn warning(&self, summary: &str) {
        self.event(EventKind::Warning, summary, Value::Null);
    }

    pub fn error(&self, summary: &str) {
        self.event(EventKind::Error, summary, Value::Null);
    }

    pub fn fatal(&self, summary: &str) {
        self.event(EventKind::FatalError, summary, Value::Null);
    }

    /// Appends an unparsed proposer reply to the raw reply log.
    pub fn raw_reply(&self, label: &str, text: &str) {
        log::debug!("[{}] raw reply for {} ({} bytes)", self.agent, label, text.len());
        let Some(dir) = &self.dir else {
            return;
        };
        let entry = format!(
            "--- RAW RESPONSE | {} @ {} ---\n{}\n--- END RAW RESPONSE ---\n",
            label,
            chrono::Local::now().to_rfc3339(),
            text
        );
        append_line(&dir.join(RAW_REPLY_LOG_FILE), &entry);
    }
}

fn append_line(path: &Path, line: &str) {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| writeln!(f, "{}", line));
    if let Err(e) = result {
        log::error!("Failed to write log file {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_events_are_appended_as_json_lines() {
        let tmp = TempDir::new().unwrap();
        let logger = RunLogger::new("fixer", "run_a", tmp.path());
        logger.milestone("started");
        logger.event(EventKind::Info, "batch done", json!({"batch_id": "batch_1"}));

        let content = fs::read_to_string(tmp.path().join("fixer/run_a").join(MAIN_LOG_FILE)).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "MILESTONE");
        assert_eq!(lines[1]["data"]["batch_id"], "batch_1");
        assert_eq!(lines[1]["data"]["summary"], "batch done");
    }

    #[test]
    fn test_raw_replies_go_to_their_own_file() {
        let tmp = TempDir::new().unwrap();
        let logger = RunLogger::new("generator", "r", tmp.path()).for_agent("optimizer");
        logger.raw_reply("batch_1/C1", "{\"course_id\": \"C1\"}");

        let dir = tmp.path().join("optimizer/r");
        let raw = fs::read_to_string(dir.join(RAW_REPLY_LOG_FILE)).unwrap();
        assert!(raw.contains("batch_1/C1"));
        assert!(!dir.join(MAIN_LOG_FILE).exists());
    }
}
