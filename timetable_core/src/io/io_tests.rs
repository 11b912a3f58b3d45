#[cfg(test)]
mod tests {
    use crate::error::PipelineError;
    use crate::io::{
        batch_file_index, initial_batch_dirs, parse_json_str, read_batches, read_json,
        sorted_json_files, write_batches, write_json, BatchReport, BatchStatus, ReportKind,
        RunReport, StageDir,
    };
    use crate::models::{Batch, Course, ReferenceData};
    use crate::proposer::CallUsage;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Helper to write the four required reference files
    fn write_reference_files(dir: &Path) {
        write_json(
            &dir.join("courses.json"),
            &json!([{"course_id": "CS101-1-0", "num_students": 40, "course_name": "Intro"}]),
        )
        .unwrap();
        write_json(
            &dir.join("instructors.json"),
            &json!([{"instructor_id": 7, "available_times": "1-1; 1-2"}]),
        )
        .unwrap();
        write_json(
            &dir.join("rooms.json"),
            &json!([{"room_id": "A508", "room_capacity": 50, "room_type": "theory"}]),
        )
        .unwrap();
        write_json(&dir.join("curriculum.json"), &json!({"HK1": ["CS101"]})).unwrap();
    }

    #[test]
    fn test_batch_file_index() {
        assert_eq!(batch_file_index(Path::new("batch_10.json")), 10);
        assert_eq!(batch_file_index(Path::new("validated_schedule_batch_2.json")), 2);
        assert_eq!(batch_file_index(Path::new("batch_.json")), 0);
        assert_eq!(batch_file_index(Path::new("batch_2.txt")), 0);
        assert_eq!(batch_file_index(Path::new("batch_x1.json")), 0);
    }

    #[test]
    fn test_sorted_json_files_is_numeric() {
        let tmp = TempDir::new().unwrap();
        for i in [10, 2, 1] {
            write_json(&tmp.path().join(format!("batch_{}.json", i)), &json!([])).unwrap();
        }
        write_json(&tmp.path().join("notes.json"), &json!([])).unwrap();

        let files = sorted_json_files(tmp.path(), "batch_").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["batch_1.json", "batch_2.json", "batch_10.json"]);
    }

    #[test]
    fn test_batches_round_trip_through_directory() {
        let tmp = TempDir::new().unwrap();
        let batches = vec![
            Batch::new(1, vec![Course::new("A-1-0", 10).placed("1-1", "R1")]),
            Batch::new(2, vec![Course::new("B-1-0", 20)]),
        ];
        write_batches(tmp.path(), &batches).unwrap();

        let loaded = read_batches(tmp.path()).unwrap();
        assert_eq!(loaded, batches);
    }

    #[test]
    fn test_parse_error_names_the_entry() {
        let err = parse_json_str::<Vec<Course>>(r#"[{"course_id": "A"}, {"course_id": []}]"#)
            .unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("[1]"), "{}", msg);
    }

    #[test]
    fn test_stage_dir_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let first = StageDir::create(tmp.path(), "fixer", "level_1").unwrap();
        let second = StageDir::create(tmp.path(), "fixer", "level_1").unwrap();

        assert!(first.root().ends_with("fixer_level_1"));
        assert_ne!(first.root(), second.root());
        let name = second.root().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("fixer_level_1_"));
        assert!(second.root().is_dir());
    }

    #[test]
    fn test_stage_paths() {
        let stage = StageDir::open("/tmp/x");
        assert!(stage.working_dir().ends_with("working_schedules"));
        assert!(stage
            .validation_dir("batch_1")
            .ends_with("validation_output/batch_1"));
        assert!(stage.report_path("fixer").ends_with("run_report_fixer.txt"));

        let (courses, instructors) = initial_batch_dirs(Path::new("data"), 5);
        assert!(courses.ends_with("courses_batches_05"));
        assert!(instructors.ends_with("instructors_batches_05"));
    }

    #[test]
    fn test_reference_data_load() {
        let tmp = TempDir::new().unwrap();
        write_reference_files(tmp.path());

        let reference = ReferenceData::load(tmp.path()).unwrap();
        assert_eq!(reference.instructor("7").map(|i| i.max_courses_per_day), Some(4));
        assert_eq!(reference.room("A508").map(|r| r.room_capacity), Some(50));
        assert_eq!(reference.semester_of("CS101-1-0"), Some("HK1"));
        assert!(reference.constraints.is_null());
        assert_eq!(
            reference.course("CS101-1-0").and_then(|c| c.extra.get("course_name")),
            Some(&json!("Intro"))
        );
    }

    #[test]
    fn test_missing_or_empty_reference_file() {
        let tmp = TempDir::new().unwrap();
        write_reference_files(tmp.path());
        fs::remove_file(tmp.path().join("rooms.json")).unwrap();
        assert!(matches!(
            ReferenceData::load(tmp.path()),
            Err(PipelineError::MissingStaticData(_))
        ));

        write_json(&tmp.path().join("rooms.json"), &json!([])).unwrap();
        assert!(matches!(
            ReferenceData::load(tmp.path()),
            Err(PipelineError::MissingStaticData(_))
        ));
    }

    #[test]
    fn test_unreadable_or_malformed_reference_file() {
        let tmp = TempDir::new().unwrap();
        write_reference_files(tmp.path());

        // not UTF-8, so the read itself fails
        fs::write(tmp.path().join("rooms.json"), [0xff, 0xfe, 0x00]).unwrap();
        match ReferenceData::load(tmp.path()) {
            Err(PipelineError::Io { path, .. }) => assert!(path.ends_with("rooms.json")),
            other => panic!("expected an I/O error, got {:?}", other.map(|_| ())),
        }

        fs::write(tmp.path().join("rooms.json"), "[{\"room_id\": ").unwrap();
        assert!(matches!(
            ReferenceData::load(tmp.path()),
            Err(PipelineError::Serialization(_))
        ));
    }

    #[test]
    fn test_optional_constraints_are_kept() {
        let tmp = TempDir::new().unwrap();
        write_reference_files(tmp.path());
        write_json(&tmp.path().join("constraints.json"), &json!({"max_gap": 2})).unwrap();

        let reference = ReferenceData::load(tmp.path()).unwrap();
        assert_eq!(reference.constraints["max_gap"], 2);
    }

    #[test]
    fn test_run_report_render() {
        let mut report = RunReport::new(ReportKind::Fixer, "scripted");
        let mut processed = BatchReport::new("batch_1", BatchStatus::Processed);
        processed.succeeded = 2;
        processed.failed = 1;
        processed.usage = CallUsage {
            calls: 3,
            total_tokens: 300,
            ..CallUsage::default()
        };
        report.batches.push(processed);
        report
            .batches
            .push(BatchReport::new("batch_2", BatchStatus::SkippedClean));

        let text = report.render();
        assert!(text.starts_with("--- Fixer Run Report ---"));
        assert!(text.contains("Courses Fixed: 2"));
        assert!(text.contains("Courses Failed: 1"));
        assert!(text.contains("Total Tokens: 300"));
        assert!(text.contains("Batch batch_2: Skipped (Clean)"));

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run_report_fixer.txt");
        report.write(&path).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), text);
    }

    #[test]
    fn test_read_json_reports_path() {
        let err = read_json::<Vec<Course>>(Path::new("/no/such/file.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("/no/such/file.json"));
    }
}
