//! Proposer backed by an external program.
//!
//! The program receives the serialized [`ProposalRequest`] on stdin and must
//! print its answer on stdout. The answer may be wrapped in prose or a fenced
//! code block; see [`extract_reply_json`](super::extract_reply_json). An
//! optional top-level `usage` object is read into [`CallUsage`].

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::reply::{extract_reply_json, parse_assignments};
use super::{AssignmentProposer, CallUsage, ProposalRequest, ProposerError, ProposerReply};

#[derive(Debug, Clone)]
pub struct CommandProposer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandProposer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn split_usage(value: Value) -> (Value, CallUsage) {
        match value {
            Value::Object(mut map) => {
                let usage = map
                    .remove("usage")
                    .and_then(|u| serde_json::from_value(u).ok())
                    .unwrap_or_default();
                (Value::Object(map), usage)
            }
            other => (other, CallUsage::default()),
        }
    }
}

#[async_trait]
impl AssignmentProposer for CommandProposer {
    fn name(&self) -> &str {
        self.program
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("command")
    }

    async fn propose(&self, request: &ProposalRequest) -> Result<ProposerReply, ProposerError> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| ProposerError::CallFailed(format!("cannot encode request: {}", e)))?;
        let started = Instant::now();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProposerError::Unavailable(format!("{}: {}", self.program.display(), e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| ProposerError::CallFailed(format!("writing request: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ProposerError::CallFailed(e.to_string()))?;
        if !output.status.success() {
            return Err(ProposerError::CallFailed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        let value = extract_reply_json(&text)
            .ok_or_else(|| ProposerError::MalformedReply("no JSON found in output".to_string()))?;
        let (value, mut usage) = Self::split_usage(value);
        let assignments = parse_assignments(value)?;

        usage.calls = usage.calls.max(1);
        usage.seconds = started.elapsed().as_secs_f64();

        Ok(ProposerReply {
            assignments,
            usage,
            raw: Some(text),
        })
    }
}
