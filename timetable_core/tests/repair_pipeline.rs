//! Integration tests for merging, cleaning, the repair controller and the
//! end-to-end pipeline, driven by a scripted proposer.

use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use timetable_core::config::{PipelineConfig, RepairSettings};
use timetable_core::constraints::ScheduleValidator;
use timetable_core::error::PipelineError;
use timetable_core::io::json::{read_schedule, write_schedule};
use timetable_core::io::layout::StageDir;
use timetable_core::logging::{RunLogger, MAIN_LOG_FILE};
use timetable_core::models::{Batch, Course, Curriculum, Instructor, ReferenceData, Room};
use timetable_core::pipeline::{run_pipeline, PipelineRun};
use timetable_core::processing::{clean_and_analyze, merge_directory};
use timetable_core::proposer::{Assignment, ScriptedProposer};
use timetable_core::repair::{RepairController, RepairState};

// ==================== Helper Functions ====================

fn write_file(path: &Path, value: serde_json::Value) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

/// Four courses, two instructors, two rooms, two semesters.
fn write_reference(data_dir: &Path) {
    write_file(
        &data_dir.join("courses.json"),
        json!([
            {"course_id": "C1-1-0", "num_students": 40, "assigned_instructor": "I1"},
            {"course_id": "C2-1-0", "num_students": 30, "assigned_instructor": "I1"},
            {"course_id": "C3-1-0", "num_students": 20, "assigned_instructor": "I2"},
            {"course_id": "C4-1-0", "num_students": 10, "assigned_instructor": "I2"}
        ]),
    );
    write_file(
        &data_dir.join("instructors.json"),
        json!([{"instructor_id": "I1"}, {"instructor_id": "I2"}]),
    );
    write_file(
        &data_dir.join("rooms.json"),
        json!([
            {"room_id": "R1", "room_capacity": 50, "room_type": "theory"},
            {"room_id": "R2", "room_capacity": 50, "room_type": "theory"}
        ]),
    );
    write_file(
        &data_dir.join("curriculum.json"),
        json!({"HK1": ["C1", "C2"], "HK2": ["C3", "C4"]}),
    );
}

fn config_for(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths.data_dir = root.join("data");
    config.paths.output_dir = root.join("output");
    config.paths.log_dir = root.join("log");
    config.batching.batch_size = 2;
    config.optimizer.max_iterations = 1;
    config
}

fn small_reference() -> Arc<ReferenceData> {
    Arc::new(ReferenceData::new(
        vec![Instructor::new("I1"), Instructor::new("I2")],
        vec![Room::new("R1", 50, "theory"), Room::new("R2", 50, "theory")],
        vec![],
        Curriculum::new(),
    ))
}

fn placed(id: &str, instructor: &str, slot: &str, room: &str) -> Course {
    Course::new(id, 10).with_instructor(instructor).placed(slot, room)
}

// ==================== Merging ====================

#[test]
fn test_merge_seven_files_to_three_then_one() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in");
    for i in 1..=7 {
        write_schedule(
            &input.join(format!("batch_{}.json", i)),
            &[Course::new(format!("C{}-1-0", i), 10)],
        )
        .unwrap();
    }

    let level2 = StageDir::create(tmp.path(), "merger", "L1_merge_to_L2").unwrap();
    let result = merge_directory(&input, &level2).unwrap();

    let groups: Vec<Vec<&str>> = result
        .batches
        .iter()
        .map(|b| b.courses.iter().map(|c| c.course_id.as_str()).collect())
        .collect();
    assert_eq!(
        groups,
        vec![
            vec!["C1-1-0", "C2-1-0"],
            vec!["C3-1-0", "C4-1-0"],
            vec!["C5-1-0", "C6-1-0", "C7-1-0"],
        ]
    );
    assert_eq!(read_schedule(&level2.consolidated_path()).unwrap().len(), 7);

    let level3 = StageDir::create(tmp.path(), "merger", "L2_merge_to_L3").unwrap();
    let result = merge_directory(&level2.working_dir(), &level3).unwrap();
    assert_eq!(result.batches.len(), 1);
    assert_eq!(result.batches[0].len(), 7);
}

// ==================== Cleaning ====================

#[test]
fn test_clean_schedule_has_no_unsolved() {
    let tmp = TempDir::new().unwrap();
    let stage = StageDir::create(tmp.path(), "merger", "L2_merge_to_L3").unwrap();
    let mut touched = placed("A-1-0", "I1", "1-1", "R1");
    touched.proposer_touched = true;
    write_schedule(
        &stage.consolidated_path(),
        &[touched, placed("B-1-0", "I1", "1-2", "R1")],
    )
    .unwrap();

    let outcome = clean_and_analyze(stage.root()).unwrap();
    assert_eq!(outcome.clean_count, 2);
    assert_eq!(outcome.unsolved_count, 0);

    let clean = read_schedule(&outcome.clean_path).unwrap();
    assert!(clean.iter().all(|c| !c.proposer_touched));
}

// ==================== Repair Controller ====================

#[tokio::test]
async fn test_controller_persists_every_stage() {
    let tmp = TempDir::new().unwrap();
    let validator = ScheduleValidator::new(small_reference());
    let proposer = ScriptedProposer::new();
    proposer.script_course(Assignment::new("A-1-0", "1-1", "R1"));
    proposer.script_course(Assignment::new("B-1-0", "2-1", "R1"));
    let logger = RunLogger::new("pipeline", "controller", &tmp.path().join("log"));

    let batches = vec![
        Batch::new(
            1,
            vec![
                placed("A-1-0", "I1", "1-1", "R1"),
                placed("B-1-0", "I1", "1-1", "R2"),
            ],
        ),
        Batch::new(2, vec![placed("C-1-0", "I2", "1-1", "R2")]),
    ];
    let outcome = RepairController::new(&proposer, &validator, RepairSettings::default(), &logger)
        .with_output(tmp.path().join("run"))
        .repair(batches, None)
        .await
        .unwrap();

    assert!(outcome.is_clean());
    assert_eq!(
        outcome.trace,
        vec![
            RepairState::Fixing { level: 1 },
            RepairState::Fixed { level: 1 },
            RepairState::Merging { level: 1 },
            RepairState::Fixing { level: 2 },
            RepairState::Fixed { level: 2 },
            RepairState::Done,
        ]
    );

    let run = tmp.path().join("run");
    assert!(run.join("fixer_L1_fix_run1").join("run_report_fixer.txt").is_file());
    let merged = run.join("merger_L1_merge_to_L2");
    assert!(merged.join("consolidated_schedule.json").is_file());
    assert_eq!(outcome.final_stage.as_ref().map(|s| s.root()), Some(merged.as_path()));
    assert_eq!(outcome.schedule().len(), 3);
}

#[tokio::test]
async fn test_unfixed_courses_stay_violating_and_unsolved() {
    let tmp = TempDir::new().unwrap();
    let validator = ScheduleValidator::new(small_reference());
    let proposer = ScriptedProposer::new();
    let logger = RunLogger::new("pipeline", "unfixed", &tmp.path().join("log"));

    let batches = vec![Batch::new(
        1,
        vec![
            placed("A-1-0", "I1", "1-1", "R1"),
            placed("B-1-0", "I1", "1-1", "R2"),
        ],
    )];
    let outcome = RepairController::new(&proposer, &validator, RepairSettings::default(), &logger)
        .with_output(tmp.path().join("run"))
        .repair(batches, None)
        .await
        .unwrap();

    assert_eq!(
        outcome.trace,
        vec![
            RepairState::Fixing { level: 1 },
            RepairState::BudgetExhausted { level: 1 },
            RepairState::Done,
        ]
    );
    let level = &outcome.levels[0];
    assert_eq!(level.violations_per_pass, vec![2, 2, 2]);
    assert_eq!(level.failed, 4);
    assert!(!outcome.is_clean());
    assert!(outcome
        .schedule()
        .iter()
        .all(|c| !c.is_placed() && c.has_violations()));

    let stage = outcome.final_stage.as_ref().unwrap();
    let cleaned = clean_and_analyze(stage.root()).unwrap();
    assert_eq!(cleaned.clean_count, 0);
    assert_eq!(cleaned.unsolved_count, 2);
}

// ==================== Pipeline ====================

#[tokio::test]
async fn test_pipeline_end_to_end_with_optimization() {
    let tmp = TempDir::new().unwrap();
    write_reference(&tmp.path().join("data"));
    let mut config = config_for(tmp.path());
    config.optimizer.enabled = true;

    let proposer = ScriptedProposer::new();
    // generation: batch 1 double-books I1, batch 2 is fine
    proposer.push_reply(vec![
        Assignment::new("C1-1-0", "1-1", "R1"),
        Assignment::new("C2-1-0", "1-1", "R2"),
    ]);
    proposer.push_reply(vec![
        Assignment::new("C3-1-0", "1-2", "R1"),
        Assignment::new("C4-1-0", "1-3", "R1"),
    ]);
    // fixer: one call per violating course
    proposer.push_reply(vec![Assignment::new("C1-1-0", "1-1", "R1")]);
    proposer.push_reply(vec![Assignment::new("C2-1-0", "1-4", "R2")]);
    // optimizer: nothing for C1, close I1's gap with C2
    proposer.push_reply(vec![]);
    proposer.push_reply(vec![Assignment::new("C2-1-0", "1-2", "R2")]);

    let summary = run_pipeline(&config, &proposer, &PipelineRun::new("e2e"))
        .await
        .unwrap();

    let repair = summary.repair.as_ref().unwrap();
    assert!(repair.is_clean());
    assert_eq!(repair.trace.first(), Some(&RepairState::Generating));
    assert_eq!(repair.trace.last(), Some(&RepairState::Done));
    assert_eq!(repair.levels[0].violations_per_pass, vec![2, 0]);
    assert_eq!(summary.hard_stage, summary.run_dir.join("merger_L1_merge_to_L2"));

    let optimization = summary.optimization.as_ref().unwrap();
    assert_eq!(optimization.clean.unsolved_count, 0);
    assert_eq!(optimization.passes, vec![(1, 1)]);
    assert_eq!(optimization.initial_penalty, 4.0);
    assert_eq!(optimization.final_penalty, 2.0);

    // artifacts of every stage stay on disk
    assert!(config.paths.data_dir.join("courses_batches_02/batch_courses_1.json").is_file());
    assert!(summary.run_dir.join("generator_initial/run_report_generator.txt").is_file());
    assert!(summary.run_dir.join("rebatched_for_optimizer_initial").is_dir());
    assert!(optimization.final_stage.root().ends_with("optimizer_iter1"));
    assert!(config.paths.log_dir.join("pipeline/e2e").join(MAIN_LOG_FILE).is_file());

    let modes: Vec<&str> = proposer.calls().iter().map(|c| c.mode).collect();
    assert_eq!(
        modes,
        vec!["generate", "generate", "fix", "fix", "optimize", "optimize"]
    );
}

#[tokio::test]
async fn test_pipeline_resume_skips_hard_phase() {
    let tmp = TempDir::new().unwrap();
    write_reference(&tmp.path().join("data"));
    let config = config_for(tmp.path());

    let stage = StageDir::create(&tmp.path().join("previous"), "merger", "L2_merge_to_L3").unwrap();
    write_schedule(
        &stage.consolidated_path(),
        &[
            placed("C1-1-0", "I1", "1-1", "R1"),
            placed("C2-1-0", "I1", "1-3", "R1"),
        ],
    )
    .unwrap();

    let proposer = ScriptedProposer::new();
    let mut run = PipelineRun::new("resumed");
    run.start_from = Some(stage.root().to_path_buf());
    run.optimize = true;

    let summary = run_pipeline(&config, &proposer, &run).await.unwrap();

    assert!(summary.repair.is_none());
    assert_eq!(summary.hard_stage, stage.root());
    let optimization = summary.optimization.unwrap();
    // both I1 courses are candidates, neither gets a proposal
    assert_eq!(optimization.passes, vec![(0, 2)]);
    assert_eq!(optimization.initial_penalty, optimization.final_penalty);
    assert!(proposer.calls().iter().all(|c| c.mode == "optimize"));
}

#[tokio::test]
async fn test_pipeline_fails_without_reference_data() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path());
    let proposer = ScriptedProposer::new();

    let err = run_pipeline(&config, &proposer, &PipelineRun::new("broken"))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::MissingStaticData(_))
    ));
    assert_eq!(proposer.call_count(), 0);

    let log = fs::read_to_string(config.paths.log_dir.join("pipeline/broken").join(MAIN_LOG_FILE))
        .unwrap();
    assert!(log.contains("Cannot load reference data"));
}
