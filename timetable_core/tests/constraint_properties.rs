//! Integration tests for hard and soft constraint evaluation.

use std::sync::Arc;
use timetable_core::constraints::{calculate_instructor_gaps, ScheduleValidator};
use timetable_core::models::{
    AvailableTimes, Course, Curriculum, CurriculumEntry, Instructor, ReferenceData, Room,
    ViolationKind,
};

// ==================== Helper Functions ====================

/// Reference data with three instructors and two rooms. Capacity and room
/// type rules read enrolment and required type from `catalogue`.
fn reference(catalogue: Vec<Course>) -> ReferenceData {
    let mut curriculum = Curriculum::new();
    curriculum.insert(
        "HK1".to_string(),
        vec![
            CurriculumEntry::Id("MATH".to_string()),
            CurriculumEntry::Id("PHYS".to_string()),
        ],
    );

    ReferenceData::new(
        vec![
            Instructor::new("I1"),
            Instructor::new("I2").with_max_courses_per_day(1),
            Instructor::new("I3").with_available_times(AvailableTimes::parse("2-1; 2-2")),
        ],
        vec![
            Room::new("A508", 50, "theory"),
            Room::new("LAB1", 30, "lab"),
        ],
        catalogue,
        curriculum,
    )
}

fn validator() -> ScheduleValidator {
    validator_with(vec![])
}

fn validator_with(catalogue: Vec<Course>) -> ScheduleValidator {
    ScheduleValidator::new(Arc::new(reference(catalogue)))
}

fn course(id: &str, students: u32, instructor: &str, slot: &str, room: &str) -> Course {
    Course::new(id, students)
        .with_instructor(instructor)
        .placed(slot, room)
}

fn kinds_of(violations: &timetable_core::constraints::HardViolations, id: &str) -> Vec<ViolationKind> {
    violations
        .kinds_for(id)
        .map(|k| k.iter().cloned().collect())
        .unwrap_or_default()
}

// ==================== Hard Constraints ====================

#[test]
fn test_instructor_conflict_detected_and_cleared() {
    let validator = validator();
    let mut schedule = vec![
        course("MATH-1-0", 10, "I1", "1-1", "A508"),
        course("CHEM-1-0", 10, "I1", "1-1", "LAB1"),
    ];

    let violations = validator.validate_hard(&schedule);
    for id in ["MATH-1-0", "CHEM-1-0"] {
        assert!(violations.violating_ids.contains(id));
        assert!(kinds_of(&violations, id).contains(&ViolationKind::InstructorConflict));
    }

    schedule[1].time_slot = Some("1-2".to_string());
    let violations = validator.validate_hard(&schedule);
    assert!(violations.is_clean(), "{:?}", violations);
}

#[test]
fn test_capacity_boundary() {
    let over = validator_with(vec![Course::new("BIG-1-0", 60)])
        .validate_hard(&[course("BIG-1-0", 60, "I1", "1-1", "A508")]);
    assert_eq!(kinds_of(&over, "BIG-1-0"), vec![ViolationKind::RoomCapacity]);

    let exact = validator_with(vec![Course::new("BIG-1-0", 50)])
        .validate_hard(&[course("BIG-1-0", 50, "I1", "1-1", "A508")]);
    assert!(exact.is_clean());
}

#[test]
fn test_room_type_and_availability() {
    let validator = validator_with(vec![Course::new("LABW-1-0", 10).with_room_type("lab")]);
    let schedule = vec![
        course("LABW-1-0", 10, "I1", "1-1", "A508").with_room_type("lab"),
        course("EVE-1-0", 10, "I3", "3-1", "LAB1"),
    ];

    let violations = validator.validate_hard(&schedule);
    assert_eq!(kinds_of(&violations, "LABW-1-0"), vec![ViolationKind::RoomType]);
    assert_eq!(
        kinds_of(&violations, "EVE-1-0"),
        vec![ViolationKind::InstructorAvailability]
    );
}

#[test]
fn test_daily_load_and_intra_semester() {
    let validator = validator();
    let schedule = vec![
        course("MATH-1-0", 10, "I2", "4-1", "A508"),
        course("PHYS-1-0", 10, "I1", "4-1", "LAB1"),
        course("MATH-2-0", 10, "I2", "4-3", "A508"),
    ];

    let violations = validator.validate_hard(&schedule);
    // I2 teaches twice on day 4 with a limit of one
    assert!(kinds_of(&violations, "MATH-1-0").contains(&ViolationKind::InstructorDailyLoad));
    assert!(kinds_of(&violations, "MATH-2-0").contains(&ViolationKind::InstructorDailyLoad));
    // same semester, same slot, different base course
    assert!(kinds_of(&violations, "PHYS-1-0").contains(&ViolationKind::IntraSemesterConflict));
    assert!(!kinds_of(&violations, "MATH-2-0").contains(&ViolationKind::IntraSemesterConflict));
}

#[test]
fn test_unresolvable_references_skip_checks() {
    // X is missing from the catalogue, so capacity and room type are skipped
    let validator = validator();
    let schedule = vec![
        course("X-1-0", 500, "ghost", "1-1", "nowhere").with_room_type("lab"),
        course("Y-1-0", 10, "I1", "garbage", "A508"),
    ];
    assert!(validator.validate_hard(&schedule).is_clean());
}

// ==================== Idempotence ====================

#[test]
fn test_revalidating_annotated_clean_schedule() {
    let validator = validator();
    let schedule = vec![
        course("MATH-1-0", 10, "I1", "1-1", "A508"),
        course("PHYS-1-0", 10, "I1", "1-2", "A508"),
    ];

    let (annotated, first) = validator.validate_and_annotate(&schedule);
    let (again, second) = validator.validate_and_annotate(&annotated);

    assert!(first.is_clean());
    assert!(second.is_clean());
    assert!(second.details.is_empty());
    assert_eq!(again, schedule);
}

#[test]
fn test_annotations_are_replaced_not_accumulated() {
    let validator = validator();
    let mut stale = course("MATH-1-0", 10, "I1", "1-1", "A508");
    stale.hard_violation_types.insert(ViolationKind::RoomConflict);

    let (annotated, violations) = validator.validate_and_annotate(&[stale]);
    assert!(violations.is_clean());
    assert!(!annotated[0].has_violations());
}

// ==================== Soft Constraints ====================

#[test]
fn test_gap_penalty_examples() {
    let day = |periods: &[i32]| -> Vec<Course> {
        periods
            .iter()
            .map(|p| course(&format!("C{}-1-0", p), 10, "I1", &format!("3-{}", p), "A508"))
            .collect()
    };

    assert_eq!(calculate_instructor_gaps(&day(&[1, 2, 4])).0, 1);
    assert_eq!(calculate_instructor_gaps(&day(&[1, 2, 3])).0, 0);
    assert_eq!(calculate_instructor_gaps(&day(&[5])).0, 0);

    let (_, details) = calculate_instructor_gaps(&day(&[1, 4]));
    assert_eq!(details["I1"][&3], 2);
}

#[test]
fn test_weighted_soft_total() {
    let validator = validator().with_weights(timetable_core::constraints::SoftWeights {
        gap: 2.0,
        room: 0.5,
    });
    let schedule = vec![
        course("A-1-0", 10, "I1", "1-1", "A508"),
        course("B-1-0", 10, "I1", "1-3", "LAB1"),
    ];

    let report = validator.validate_soft(&schedule);
    assert_eq!(report.penalties.instructor_gaps.raw, 1);
    assert_eq!(report.penalties.room_usage.raw, 2);
    assert_eq!(report.total_weighted_penalty, 2.0 * 1.0 + 0.5 * 2.0);
}
