//! Initial batching and re-batching of flat schedules.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::io::json::{read_json, write_json, write_schedule};
use crate::io::layout::{initial_batch_dirs, reset_dir, sorted_json_files, StageDir};
use crate::io::{batch_file_index, write_batches};
use crate::models::{Batch, Course, Instructor};

/// A fresh batch together with the instructors its courses reference.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialBatch {
    pub batch: Batch,
    pub roster: Vec<Instructor>,
}

/// Splits `courses` into unplaced batches of at most `batch_size`.
///
/// Courses are ordered by enrolment, largest first (ties keep input order),
/// so the hardest placements land in the earliest batches. Every course gets
/// the unassigned marker in `time_slot` and `room_id`, and prior annotations
/// are dropped.
///
/// # Examples
///
/// ```
/// use timetable_core::models::{Course, Instructor};
/// use timetable_core::processing::prepare_initial_batches;
///
/// let courses = vec![
///     Course::new("S-1-0", 10).with_instructor("I1"),
///     Course::new("L-1-0", 90).with_instructor("I2"),
///     Course::new("M-1-0", 40).with_instructor("I1"),
/// ];
/// let instructors = vec![Instructor::new("I1"), Instructor::new("I2")];
///
/// let batches = prepare_initial_batches(courses, &instructors, 2);
/// assert_eq!(batches.len(), 2);
/// assert_eq!(batches[0].batch.courses[0].course_id, "L-1-0");
/// assert_eq!(batches[1].roster.len(), 1);
/// ```
pub fn prepare_initial_batches(
    mut courses: Vec<Course>,
    instructors: &[Instructor],
    batch_size: usize,
) -> Vec<InitialBatch> {
    courses.sort_by(|a, b| b.num_students.cmp(&a.num_students));

    courses
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(i, chunk)| {
            let courses: Vec<Course> = chunk
                .iter()
                .cloned()
                .map(|mut c| {
                    c.unassign();
                    c.clear_annotations();
                    c
                })
                .collect();
            let roster = roster_for(&courses, instructors);
            InitialBatch {
                batch: Batch::new(i + 1, courses),
                roster,
            }
        })
        .collect()
}

/// Instructors referenced by `courses`, in reference-file order.
fn roster_for(courses: &[Course], instructors: &[Instructor]) -> Vec<Instructor> {
    let referenced: HashSet<&str> = courses
        .iter()
        .filter_map(|c| c.assigned_instructor.as_deref())
        .map(str::trim)
        .collect();

    instructors
        .iter()
        .filter(|i| referenced.contains(i.instructor_id.as_str()))
        .cloned()
        .collect()
}

/// Resets the initial batch directories under `data_dir` and writes
/// `batch_courses_<i>.json` / `batch_instructors_<i>.json` pairs.
pub fn write_initial_batches(
    data_dir: &Path,
    batch_size: usize,
    batches: &[InitialBatch],
) -> Result<(PathBuf, PathBuf)> {
    let (courses_dir, instructors_dir) = initial_batch_dirs(data_dir, batch_size);
    reset_dir(&courses_dir)?;
    reset_dir(&instructors_dir)?;

    for initial in batches {
        let i = initial.batch.index;
        write_schedule(
            &courses_dir.join(format!("batch_courses_{}.json", i)),
            &initial.batch.courses,
        )?;
        write_json(
            &instructors_dir.join(format!("batch_instructors_{}.json", i)),
            &initial.roster,
        )?;
        log::info!("Batch {}: {} courses", i, initial.batch.len());
    }

    Ok((courses_dir, instructors_dir))
}

/// Reads back the initial batches written by [`write_initial_batches`]. A
/// missing roster file yields an empty roster.
pub fn read_initial_batches(data_dir: &Path, batch_size: usize) -> Result<Vec<InitialBatch>> {
    let (courses_dir, instructors_dir) = initial_batch_dirs(data_dir, batch_size);
    let files = sorted_json_files(&courses_dir, "batch_courses_")
        .with_context(|| format!("No initial batches in {}", courses_dir.display()))?;

    files
        .iter()
        .map(|path| -> Result<InitialBatch> {
            let index = batch_file_index(path);
            let courses: Vec<Course> = read_json(path)?;
            let roster_path = instructors_dir.join(format!("batch_instructors_{}.json", index));
            let roster = if roster_path.is_file() {
                read_json(&roster_path)?
            } else {
                Vec::new()
            };
            Ok(InitialBatch {
                batch: Batch::new(index, courses),
                roster,
            })
        })
        .collect()
}

/// Splits an already placed schedule into batches without reordering or
/// resetting anything.
pub fn rebatch_schedule(schedule: &[Course], batch_size: usize) -> Vec<Batch> {
    schedule
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(i, chunk)| Batch::new(i + 1, chunk.to_vec()))
        .collect()
}

/// Writes `schedule` as the stage's consolidated file and its re-batched
/// form under `working_schedules/`.
pub fn write_rebatched(stage: &StageDir, schedule: &[Course], batch_size: usize) -> Result<Vec<Batch>> {
    write_schedule(&stage.consolidated_path(), schedule)?;
    let batches = rebatch_schedule(schedule, batch_size);
    write_batches(&stage.working_dir(), &batches)?;
    log::info!(
        "Re-batched {} courses into {} batches",
        schedule.len(),
        batches.len()
    );
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn courses(sizes: &[u32]) -> Vec<Course> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                Course::new(format!("C{}-1-0", i), n)
                    .with_instructor(format!("I{}", i % 2))
                    .placed("1-1", "R1")
            })
            .collect()
    }

    #[test]
    fn test_initial_batches_are_sorted_and_reset() {
        let instructors = vec![Instructor::new("I0"), Instructor::new("I1"), Instructor::new("I9")];
        let batches = prepare_initial_batches(courses(&[5, 50, 20, 50, 1]), &instructors, 2);

        assert_eq!(batches.len(), 3);
        let order: Vec<u32> = batches
            .iter()
            .flat_map(|b| b.batch.courses.iter().map(|c| c.num_students))
            .collect();
        assert_eq!(order, vec![50, 50, 20, 5, 1]);
        // ties keep input order
        assert_eq!(batches[0].batch.courses[0].course_id, "C1-1-0");
        assert!(batches
            .iter()
            .flat_map(|b| &b.batch.courses)
            .all(|c| !c.is_placed() && c.time_slot.as_deref() == Some("<>")));
        assert_eq!(batches[2].batch.len(), 1);
        assert_eq!(batches[2].batch.index, 3);
        // roster only lists referenced instructors
        assert!(batches
            .iter()
            .all(|b| b.roster.iter().all(|i| i.instructor_id != "I9")));
    }

    #[test]
    fn test_rebatch_keeps_placement_and_order() {
        let schedule = courses(&[5, 50, 20]);
        let batches = rebatch_schedule(&schedule, 2);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].courses[0].course_id, "C0-1-0");
        assert!(batches[1].courses[0].is_placed());
    }

    #[test]
    fn test_initial_batch_files_round_trip() {
        let tmp = TempDir::new().unwrap();
        let instructors = vec![Instructor::new("I0"), Instructor::new("I1")];
        let batches = prepare_initial_batches(courses(&[3, 2, 1]), &instructors, 2);

        let (courses_dir, instructors_dir) = write_initial_batches(tmp.path(), 2, &batches).unwrap();
        assert!(courses_dir.join("batch_courses_2.json").is_file());
        assert!(instructors_dir.join("batch_instructors_1.json").is_file());

        let loaded = read_initial_batches(tmp.path(), 2).unwrap();
        assert_eq!(loaded, batches);

        // a second run starts from empty directories
        let fewer = prepare_initial_batches(courses(&[3]), &instructors, 2);
        write_initial_batches(tmp.path(), 2, &fewer).unwrap();
        assert!(!courses_dir.join("batch_courses_2.json").exists());
    }
}
