//! On-disk layout of pipeline artifacts.
//!
//! A stage directory looks like:
//!
//! ```text
//! <output>/<stage>_<tag>/
//!     working_schedules/batch_<i>.json
//!     consolidated_schedule.json
//!     validation_output/<stem>/{validated_schedule_<stem>.json, validation_report_<stem>.json}
//!     cleaning_and_analysis_output/{clean_schedule_for_optimizer.json, unsolved_courses.json}
//!     sc_validation_output/{soft_validation_report.json, validated_schedule_with_sc_score.json}
//!     run_report_<kind>.txt
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::json::{read_schedule, write_schedule};
use crate::models::Batch;

pub const WORKING_SCHEDULES_DIR: &str = "working_schedules";
pub const CONSOLIDATED_FILE: &str = "consolidated_schedule.json";
pub const VALIDATION_OUTPUT_DIR: &str = "validation_output";
pub const CLEANING_OUTPUT_DIR: &str = "cleaning_and_analysis_output";
pub const CLEAN_SCHEDULE_FILE: &str = "clean_schedule_for_optimizer.json";
pub const UNSOLVED_FILE: &str = "unsolved_courses.json";
pub const SC_VALIDATION_DIR: &str = "sc_validation_output";
pub const SOFT_REPORT_FILE: &str = "soft_validation_report.json";
pub const SC_SCHEDULE_FILE: &str = "validated_schedule_with_sc_score.json";

/// Numeric index embedded as `_<digits>.json` at the end of a file name.
/// Names without one sort as index 0.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use timetable_core::io::batch_file_index;
///
/// assert_eq!(batch_file_index(Path::new("out/batch_12.json")), 12);
/// assert_eq!(batch_file_index(Path::new("batch_courses_3.json")), 3);
/// assert_eq!(batch_file_index(Path::new("consolidated_schedule.json")), 0);
/// ```
pub fn batch_file_index(path: &Path) -> usize {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|name| name.strip_suffix(".json"))
        .and_then(|stem| stem.rsplit_once('_'))
        .map(|(_, digits)| digits)
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

/// `*.json` files directly in `dir` whose name starts with `prefix`, ordered
/// by embedded index, then by name.
pub fn sorted_json_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to list directory: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read entry in {}", dir.display()))?
            .path();
        let matches = path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(prefix) && n.ends_with(".json"));
        if matches {
            files.push(path);
        }
    }

    files.sort_by(|a, b| {
        batch_file_index(a)
            .cmp(&batch_file_index(b))
            .then_with(|| a.file_name().cmp(&b.file_name()))
    });
    Ok(files)
}

/// Reads every `batch_*.json` in `dir` in index order.
///
/// A file whose name carries no index takes its 1-based position instead.
pub fn read_batches(dir: &Path) -> Result<Vec<Batch>> {
    sorted_json_files(dir, "batch_")?
        .iter()
        .enumerate()
        .map(|(pos, path)| -> Result<Batch> {
            let index = match batch_file_index(path) {
                0 => pos + 1,
                i => i,
            };
            Ok(Batch::new(index, read_schedule(path)?))
        })
        .collect()
}

/// Writes each batch as `batch_<index>.json` under `dir`.
pub fn write_batches(dir: &Path, batches: &[Batch]) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    for batch in batches {
        write_schedule(&dir.join(format!("{}.json", batch.name())), &batch.courses)?;
    }
    Ok(())
}

/// Empties `dir` (if present) and recreates it.
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("Failed to remove {}", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))
}

/// Directories holding the initial course and instructor batches.
pub fn initial_batch_dirs(data_dir: &Path, batch_size: usize) -> (PathBuf, PathBuf) {
    (
        data_dir.join(format!("courses_batches_{:02}", batch_size)),
        data_dir.join(format!("instructors_batches_{:02}", batch_size)),
    )
}

/// Root of one stage's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDir {
    root: PathBuf,
}

impl StageDir {
    /// Creates `<base>/<stage>_<tag>`. If that directory already exists a
    /// `_<YYYYmmdd_HHMMSS>` suffix is appended so earlier runs are never
    /// overwritten.
    pub fn create(base: &Path, stage: &str, tag: &str) -> Result<Self> {
        let mut root = base.join(format!("{}_{}", stage, tag));
        if root.exists() {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            let fresh = base.join(format!("{}_{}_{}", stage, tag, timestamp));
            log::warn!(
                "Directory '{}' already exists, using '{}' instead",
                root.display(),
                fresh.display()
            );
            root = fresh;
        }
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create stage directory: {}", root.display()))?;
        Ok(Self { root })
    }

    /// Wraps an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn working_dir(&self) -> PathBuf {
        self.root.join(WORKING_SCHEDULES_DIR)
    }

    pub fn consolidated_path(&self) -> PathBuf {
        self.root.join(CONSOLIDATED_FILE)
    }

    /// `validation_output/<stem>/`
    pub fn validation_dir(&self, stem: &str) -> PathBuf {
        self.root.join(VALIDATION_OUTPUT_DIR).join(stem)
    }

    pub fn cleaning_dir(&self) -> PathBuf {
        self.root.join(CLEANING_OUTPUT_DIR)
    }

    pub fn sc_validation_dir(&self) -> PathBuf {
        self.root.join(SC_VALIDATION_DIR)
    }

    /// `run_report_<kind>.txt`
    pub fn report_path(&self, kind: &str) -> PathBuf {
        self.root.join(format!("run_report_{}.txt", kind))
    }
}
