//! Hard-constraint rules.
//!
//! Each check is a stateless function over a [`ScheduleIndex`] that records
//! offending course ids into a shared [`HardViolations`] collector and
//! returns how many violation instances it found. A reference that cannot be
//! resolved in [`ReferenceData`] skips that check for the entry.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::index::{entity_id, ScheduleIndex};
use crate::models::{AvailableTimes, Course, ReferenceData, ViolationKind};

/// Outcome of a hard validation pass.
///
/// # Examples
///
/// ```
/// use timetable_core::constraints::HardViolations;
/// use timetable_core::models::ViolationKind;
///
/// let mut violations = HardViolations::default();
/// assert!(violations.is_clean());
///
/// violations.add("CS101-1-0", ViolationKind::RoomCapacity);
/// violations.add("CS101-1-0", ViolationKind::RoomCapacity);
/// assert_eq!(violations.violating_count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardViolations {
    pub violating_ids: BTreeSet<String>,
    pub details: BTreeMap<String, BTreeSet<ViolationKind>>,
}

impl HardViolations {
    pub fn add(&mut self, course_id: &str, kind: ViolationKind) {
        self.violating_ids.insert(course_id.to_string());
        self.details
            .entry(course_id.to_string())
            .or_default()
            .insert(kind);
    }

    pub fn is_clean(&self) -> bool {
        self.violating_ids.is_empty()
    }

    /// Number of distinct courses with at least one violation.
    pub fn violating_count(&self) -> usize {
        self.violating_ids.len()
    }

    pub fn kinds_for(&self, course_id: &str) -> Option<&BTreeSet<ViolationKind>> {
        self.details.get(course_id)
    }

    /// Count of courses carrying each violation kind.
    pub fn summary_by_type(&self) -> BTreeMap<ViolationKind, usize> {
        let mut summary = BTreeMap::new();
        for kinds in self.details.values() {
            for kind in kinds {
                *summary.entry(kind.clone()).or_insert(0) += 1;
            }
        }
        summary
    }
}

/// Same instructor booked twice in one slot.
pub fn check_instructor_conflict(index: &ScheduleIndex<'_>, out: &mut HardViolations) -> usize {
    flag_collisions(
        index.by_instructor_slot.collisions().map(|(_, c)| c),
        ViolationKind::InstructorConflict,
        out,
    )
}

/// Same room booked twice in one slot.
pub fn check_room_conflict(index: &ScheduleIndex<'_>, out: &mut HardViolations) -> usize {
    flag_collisions(
        index.by_room_slot.collisions().map(|(_, c)| c),
        ViolationKind::RoomConflict,
        out,
    )
}

fn flag_collisions<'a, I>(buckets: I, kind: ViolationKind, out: &mut HardViolations) -> usize
where
    I: Iterator<Item = &'a Vec<&'a Course>>,
{
    let mut count = 0;
    for courses in buckets {
        for course in courses {
            out.add(&course.course_id, kind.clone());
            count += 1;
        }
    }
    count
}

/// A course left unplaced by a failed proposal keeps the kinds it was
/// annotated with, so it stays violating until a later pass places it.
/// Unplaced courses without annotations are not checked.
pub fn check_unresolved_placements(schedule: &[Course], out: &mut HardViolations) -> usize {
    let mut count = 0;
    for course in schedule {
        if course.is_placed() || !course.has_violations() {
            continue;
        }
        for kind in &course.hard_violation_types {
            out.add(&course.course_id, kind.clone());
        }
        count += 1;
    }
    count
}

/// Enrolment must fit the room. Equal to capacity is fine.
pub fn check_room_capacity(
    index: &ScheduleIndex<'_>,
    reference: &ReferenceData,
    out: &mut HardViolations,
) -> usize {
    let mut count = 0;
    for course in &index.placed {
        let Some(info) = reference.course(&course.course_id) else {
            continue;
        };
        let Some(room) = entity_id(course.room_id.as_deref()).and_then(|id| reference.room(id))
        else {
            continue;
        };

        if info.num_students > room.room_capacity {
            out.add(&course.course_id, ViolationKind::RoomCapacity);
            count += 1;
        }
    }
    count
}

/// A required room type must match the room's type exactly.
pub fn check_room_type(
    index: &ScheduleIndex<'_>,
    reference: &ReferenceData,
    out: &mut HardViolations,
) -> usize {
    let mut count = 0;
    for course in &index.placed {
        let Some(required) = reference
            .course(&course.course_id)
            .and_then(|info| info.required_room_type.as_deref())
        else {
            continue;
        };
        let Some(room) = entity_id(course.room_id.as_deref()).and_then(|id| reference.room(id))
        else {
            continue;
        };

        if room.room_type != required {
            out.add(&course.course_id, ViolationKind::RoomType);
            count += 1;
        }
    }
    count
}

/// Instructor must be available in the course's slot.
pub fn check_instructor_availability(
    index: &ScheduleIndex<'_>,
    reference: &ReferenceData,
    out: &mut HardViolations,
) -> usize {
    check_availability(
        index,
        |course| {
            entity_id(course.assigned_instructor.as_deref())
                .and_then(|id| reference.instructor(id))
                .map(|inst| &inst.available_times)
        },
        ViolationKind::InstructorAvailability,
        out,
    )
}

/// Room must be available in the course's slot.
pub fn check_room_availability(
    index: &ScheduleIndex<'_>,
    reference: &ReferenceData,
    out: &mut HardViolations,
) -> usize {
    check_availability(
        index,
        |course| {
            entity_id(course.room_id.as_deref())
                .and_then(|id| reference.room(id))
                .map(|room| &room.available_times)
        },
        ViolationKind::RoomAvailability,
        out,
    )
}

fn check_availability<'r, F>(
    index: &ScheduleIndex<'_>,
    lookup: F,
    kind: ViolationKind,
    out: &mut HardViolations,
) -> usize
where
    F: Fn(&Course) -> Option<&'r AvailableTimes>,
{
    let mut count = 0;
    for course in &index.placed {
        let Some(times) = lookup(course) else {
            continue;
        };
        let slot = course.time_slot.as_deref().unwrap_or_default();
        if !times.permits(slot) {
            out.add(&course.course_id, kind.clone());
            count += 1;
        }
    }
    count
}

/// Per instructor and day, the number of slot occurrences (bucket sizes, so
/// a double booking counts twice) must not exceed `max_courses_per_day`.
/// Every course the instructor teaches on an overloaded day is flagged.
pub fn check_instructor_daily_load(
    index: &ScheduleIndex<'_>,
    reference: &ReferenceData,
    out: &mut HardViolations,
) -> usize {
    // (instructor, day) -> courses that day, in slot order
    let mut days: BTreeMap<(&str, i32), Vec<&Course>> = BTreeMap::new();
    for (key, courses) in index.by_instructor_slot.iter() {
        days.entry((key.entity, key.slot.day))
            .or_default()
            .extend(courses.iter().copied());
    }

    let mut count = 0;
    for ((instructor_id, _day), courses) in days {
        let Some(instructor) = reference.instructor(instructor_id) else {
            continue;
        };
        if courses.len() as u32 > instructor.max_courses_per_day {
            for course in courses {
                out.add(&course.course_id, ViolationKind::InstructorDailyLoad);
                count += 1;
            }
        }
    }
    count
}

/// Two different base courses of the same semester may not share a slot.
/// Sections of one base course are exempt from each other.
pub fn check_intra_semester(
    index: &ScheduleIndex<'_>,
    reference: &ReferenceData,
    out: &mut HardViolations,
) -> usize {
    let mut count = 0;
    for (_, courses) in index.by_slot.collisions() {
        for (i, first) in courses.iter().enumerate() {
            for second in &courses[i + 1..] {
                if first.base_id() == second.base_id() {
                    continue;
                }
                let (Some(sem1), Some(sem2)) = (
                    reference.semester_of(&first.course_id),
                    reference.semester_of(&second.course_id),
                ) else {
                    continue;
                };

                if sem1 == sem2 {
                    out.add(&first.course_id, ViolationKind::IntraSemesterConflict);
                    out.add(&second.course_id, ViolationKind::IntraSemesterConflict);
                    count += 1;
                }
            }
        }
    }
    count
}
