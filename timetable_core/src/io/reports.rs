//! Persisted stage reports.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::json::{write_json, write_schedule};
use super::layout::{StageDir, SC_SCHEDULE_FILE, SOFT_REPORT_FILE};
use crate::constraints::{HardViolations, SoftReport, ValidationReport};
use crate::models::{Course, ViolationKind};
use crate::proposer::CallUsage;

/// Which stage a [`RunReport`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Generator,
    Fixer,
    Optimizer,
}

impl ReportKind {
    /// Suffix of the `run_report_<kind>.txt` file.
    pub fn file_kind(self) -> &'static str {
        match self {
            ReportKind::Generator => "generator",
            ReportKind::Fixer => "fixer",
            ReportKind::Optimizer => "optimizer",
        }
    }

    fn title(self) -> &'static str {
        match self {
            ReportKind::Generator => "Generator",
            ReportKind::Fixer => "Fixer",
            ReportKind::Optimizer => "Optimizer",
        }
    }

    fn labels(self) -> (&'static str, &'static str) {
        match self {
            ReportKind::Generator => ("Courses Placed", "Courses Unplaced"),
            ReportKind::Fixer => ("Courses Fixed", "Courses Failed"),
            ReportKind::Optimizer => ("Moves Accepted", "Moves Rejected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    SkippedClean,
    Processed,
    Failed(String),
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::SkippedClean => f.write_str("Skipped (Clean)"),
            BatchStatus::Processed => f.write_str("Processed"),
            BatchStatus::Failed(reason) => write!(f, "Failed ({})", reason),
        }
    }
}

/// Outcome of one batch within a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub batch_id: String,
    pub status: BatchStatus,
    pub succeeded: usize,
    pub failed: usize,
    pub usage: CallUsage,
}

impl BatchReport {
    pub fn new(batch_id: impl Into<String>, status: BatchStatus) -> Self {
        Self {
            batch_id: batch_id.into(),
            status,
            succeeded: 0,
            failed: 0,
            usage: CallUsage::default(),
        }
    }
}

/// Plain-text summary of a generator, fixer or optimizer run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub kind: ReportKind,
    pub started: DateTime<Local>,
    pub duration: Duration,
    pub proposer: String,
    pub batches: Vec<BatchReport>,
}

impl RunReport {
    pub fn new(kind: ReportKind, proposer: impl Into<String>) -> Self {
        Self {
            kind,
            started: Local::now(),
            duration: Duration::ZERO,
            proposer: proposer.into(),
            batches: Vec::new(),
        }
    }

    pub fn total_succeeded(&self) -> usize {
        self.batches.iter().map(|b| b.succeeded).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.batches.iter().map(|b| b.failed).sum()
    }

    pub fn total_usage(&self) -> CallUsage {
        let mut total = CallUsage::default();
        for batch in &self.batches {
            total += &batch.usage;
        }
        total
    }

    pub fn render(&self) -> String {
        let (ok_label, failed_label) = self.kind.labels();
        let usage = self.total_usage();
        let mut out = String::new();

        let _ = writeln!(out, "--- {} Run Report ---", self.kind.title());
        let _ = writeln!(out, "Date: {}", self.started.to_rfc3339());
        let _ = writeln!(out, "Proposer: {}", self.proposer);
        let _ = writeln!(out, "Total Duration: {:.2}s\n", self.duration.as_secs_f64());

        let _ = writeln!(out, "--- Global Totals ---");
        let _ = writeln!(out, "{}: {}", ok_label, self.total_succeeded());
        let _ = writeln!(out, "{}: {}", failed_label, self.total_failed());
        let _ = writeln!(
            out,
            "Total Tokens: {} (In: {}, Out: {}, Think: {})\n",
            usage.total_tokens, usage.input_tokens, usage.output_tokens, usage.thinking_tokens
        );

        let _ = writeln!(out, "--- Per Batch Details ---");
        for batch in &self.batches {
            let _ = writeln!(out, "Batch {}: {}", batch.batch_id, batch.status);
            if batch.status != BatchStatus::SkippedClean {
                let _ = writeln!(
                    out,
                    "  {}: {} | {}: {}",
                    ok_label, batch.succeeded, failed_label, batch.failed
                );
                let _ = writeln!(out, "  Calls: {}", batch.usage.calls);
                let _ = writeln!(out, "  Duration: {:.2}s", batch.usage.seconds);
                let _ = writeln!(
                    out,
                    "  Tokens -> In: {} | Out: {} | Think: {}",
                    batch.usage.input_tokens, batch.usage.output_tokens, batch.usage.thinking_tokens
                );
            }
            let _ = writeln!(out, "{}", "-".repeat(30));
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())
            .with_context(|| format!("Failed to write report {}", path.display()))
    }
}

/// Writes `validated_schedule_<stem>.json` and `validation_report_<stem>.json`
/// under `validation_output/<stem>/`. Returns the annotated schedule path.
pub fn write_validation_outputs(
    stage: &StageDir,
    stem: &str,
    source: &Path,
    annotated: &[Course],
    violations: &HardViolations,
) -> Result<PathBuf> {
    let dir = stage.validation_dir(stem);
    let schedule_path = dir.join(format!("validated_schedule_{}.json", stem));
    write_schedule(&schedule_path, annotated)?;

    let report = ValidationReport::new(source.display().to_string(), annotated, violations);
    write_json(&dir.join(format!("validation_report_{}.json", stem)), &report)?;
    Ok(schedule_path)
}

#[derive(Serialize)]
struct HardSummary<'a> {
    violating_count: usize,
    details: &'a std::collections::BTreeMap<String, std::collections::BTreeSet<ViolationKind>>,
}

#[derive(Serialize)]
struct SoftValidationDocument<'a> {
    hard_validation: HardSummary<'a>,
    soft_constraint_evaluation: &'a SoftReport,
}

/// Writes the soft validation report and the annotated schedule under
/// `sc_validation_output/`.
pub fn write_soft_validation(
    stage: &StageDir,
    annotated: &[Course],
    violations: &HardViolations,
    soft: &SoftReport,
) -> Result<PathBuf> {
    let dir = stage.sc_validation_dir();
    let report_path = dir.join(SOFT_REPORT_FILE);
    write_json(
        &report_path,
        &SoftValidationDocument {
            hard_validation: HardSummary {
                violating_count: violations.violating_count(),
                details: &violations.details,
            },
            soft_constraint_evaluation: soft,
        },
    )?;
    write_schedule(&dir.join(SC_SCHEDULE_FILE), annotated)?;
    Ok(report_path)
}
