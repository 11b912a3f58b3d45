//! Splits a validated schedule into constraint-clean and unsolved courses.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::PipelineError;
use crate::io::json::{read_schedule, write_schedule};
use crate::io::layout::{StageDir, CLEAN_SCHEDULE_FILE, UNSOLVED_FILE};
use crate::models::Course;

/// Paths and counts produced by [`clean_and_analyze`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOutcome {
    pub source: PathBuf,
    pub clean_path: PathBuf,
    pub unsolved_path: PathBuf,
    pub clean_count: usize,
    pub unsolved_count: usize,
}

/// Partitions `schedule` by whether a course still carries violations.
/// Clean courses lose their annotations; unsolved ones keep them.
pub fn split_clean(schedule: Vec<Course>) -> (Vec<Course>, Vec<Course>) {
    let (mut clean, unsolved): (Vec<Course>, Vec<Course>) =
        schedule.into_iter().partition(|c| !c.has_violations());
    for course in &mut clean {
        course.clear_annotations();
    }
    (clean, unsolved)
}

fn file_name_matches(path: &Path, prefix: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with(prefix) && n.ends_with(".json"))
}

fn collect_matching(dir: &Path, prefix: &str, recursive: bool, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                collect_matching(&path, prefix, true, out);
            }
        } else if file_name_matches(&path, prefix) {
            out.push(path);
        }
    }
}

fn newest(paths: Vec<PathBuf>) -> Option<PathBuf> {
    paths.into_iter().max_by_key(|p| {
        let modified = fs::metadata(p)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        (modified, p.clone())
    })
}

/// Most recently modified validated consolidated schedule under
/// `source_dir` (searched recursively), falling back to a top-level
/// `consolidated_schedule*.json`.
pub fn find_consolidated(source_dir: &Path) -> Result<PathBuf, PipelineError> {
    let mut validated = Vec::new();
    collect_matching(source_dir, "validated_schedule_consolidated", true, &mut validated);
    if let Some(path) = newest(validated) {
        return Ok(path);
    }

    let mut plain = Vec::new();
    collect_matching(source_dir, "consolidated_schedule", false, &mut plain);
    newest(plain).ok_or_else(|| {
        PipelineError::NotFound(format!(
            "no consolidated schedule found under {}",
            source_dir.display()
        ))
    })
}

/// Locates the consolidated schedule of `source_dir`, splits it, and writes
/// the clean and unsolved subsets to `cleaning_and_analysis_output/`.
pub fn clean_and_analyze(source_dir: &Path) -> Result<CleanOutcome> {
    let source = find_consolidated(source_dir)?;
    let schedule = read_schedule(&source)?;
    let (clean, unsolved) = split_clean(schedule);

    let out_dir = StageDir::open(source_dir).cleaning_dir();
    let clean_path = out_dir.join(CLEAN_SCHEDULE_FILE);
    let unsolved_path = out_dir.join(UNSOLVED_FILE);
    write_schedule(&clean_path, &clean)?;
    write_schedule(&unsolved_path, &unsolved)?;

    log::info!(
        "Cleaned {}: {} clean, {} unsolved",
        source.display(),
        clean.len(),
        unsolved.len()
    );

    Ok(CleanOutcome {
        source,
        clean_path,
        unsolved_path,
        clean_count: clean.len(),
        unsolved_count: unsolved.len(),
    })
}
