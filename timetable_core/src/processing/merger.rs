//! Level-to-level batch reduction.
//!
//! Batches are merged left to right in index order: pairs, except that when
//! exactly three remain and the input count is odd the last three become one
//! batch. An odd count of three or more therefore never leaves a singleton
//! tail; a single input passes through unchanged.

use anyhow::Result;
use std::ops::Range;
use std::path::Path;

use crate::io::json::{read_schedule, write_schedule};
use crate::io::layout::{sorted_json_files, StageDir};
use crate::io::{batch_file_index, write_batches};
use crate::models::{flatten_batches, Batch, Course};

/// Index ranges of the input batches that form each merged batch.
///
/// # Examples
///
/// ```
/// use timetable_core::processing::plan_merge;
///
/// assert_eq!(plan_merge(7), vec![0..2, 2..4, 4..7]);
/// assert_eq!(plan_merge(4), vec![0..2, 2..4]);
/// assert_eq!(plan_merge(1), vec![0..1]);
/// ```
pub fn plan_merge(count: usize) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut i = 0;
    while i < count {
        let remaining = count - i;
        let take = if remaining == 3 && count % 2 == 1 {
            3
        } else if remaining >= 2 {
            2
        } else {
            1
        };
        groups.push(i..i + take);
        i += take;
    }
    groups
}

/// Result of one reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    /// Merged batches, renumbered from 1.
    pub batches: Vec<Batch>,
    /// Every course of every merged batch, in order.
    pub consolidated: Vec<Course>,
}

/// Merges `batches` according to [`plan_merge`].
///
/// Inputs are ordered by index first. Violation annotations and proposer
/// markers are stripped so the next level validates from a clean slate.
/// Groups whose batches are all empty produce no output batch.
pub fn merge_batches(mut batches: Vec<Batch>) -> MergeResult {
    batches.sort_by_key(|b| b.index);

    let mut merged = Vec::new();
    for group in plan_merge(batches.len()) {
        let courses: Vec<Course> = batches[group]
            .iter()
            .flat_map(|b| b.courses.iter().cloned())
            .map(|mut c| {
                c.clear_annotations();
                c
            })
            .collect();
        if courses.is_empty() {
            continue;
        }
        merged.push(Batch::new(merged.len() + 1, courses));
    }

    let consolidated = flatten_batches(&merged);
    MergeResult {
        batches: merged,
        consolidated,
    }
}

/// Merges every `*.json` schedule in `input_dir` into `stage`, writing
/// `working_schedules/batch_<i>.json` and `consolidated_schedule.json`.
pub fn merge_directory(input_dir: &Path, stage: &StageDir) -> Result<MergeResult> {
    let files = sorted_json_files(input_dir, "")?;
    log::info!("Merging {} files from {}", files.len(), input_dir.display());

    let mut batches = Vec::with_capacity(files.len());
    for (pos, path) in files.iter().enumerate() {
        let index = match batch_file_index(path) {
            0 => pos + 1,
            i => i,
        };
        batches.push(Batch::new(index, read_schedule(path)?));
    }

    let result = merge_batches(batches);
    persist_merge(stage, &result)?;
    Ok(result)
}

/// Writes a merge result into `stage`.
pub fn persist_merge(stage: &StageDir, result: &MergeResult) -> Result<()> {
    write_batches(&stage.working_dir(), &result.batches)?;
    write_schedule(&stage.consolidated_path(), &result.consolidated)
}
