//! Per-pass lookup indices over the placed courses of a schedule.
//!
//! Built once at the start of a validation pass and dropped at the end. Only
//! courses that are placed (real slot and real room) are indexed, and only
//! those whose slot parses enter the slot-keyed maps.

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::models::{is_assigned, Course, TimeSlot};

/// Composite key `(entity id, slot)` for instructor and room buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntitySlot<'a> {
    pub entity: &'a str,
    pub slot: TimeSlot,
}

/// Ordered multi-map from a key to every course sharing it.
#[derive(Debug, Clone)]
pub struct CourseMultiMap<'a, K: Ord> {
    buckets: BTreeMap<K, Vec<&'a Course>>,
}

impl<'a, K: Ord> Default for CourseMultiMap<'a, K> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
        }
    }
}

impl<'a, K: Ord> CourseMultiMap<'a, K> {
    pub fn insert(&mut self, key: K, course: &'a Course) {
        self.buckets.entry(key).or_default().push(course);
    }

    pub fn get(&self, key: &K) -> &[&'a Course] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> btree_map::Iter<'_, K, Vec<&'a Course>> {
        self.buckets.iter()
    }

    /// Buckets holding more than one course.
    pub fn collisions(&self) -> impl Iterator<Item = (&K, &Vec<&'a Course>)> {
        self.buckets.iter().filter(|(_, courses)| courses.len() > 1)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Indices used by the hard checks.
#[derive(Debug, Clone, Default)]
pub struct ScheduleIndex<'a> {
    /// Placed courses in schedule order.
    pub placed: Vec<&'a Course>,
    pub by_slot: CourseMultiMap<'a, TimeSlot>,
    pub by_instructor_slot: CourseMultiMap<'a, EntitySlot<'a>>,
    pub by_room_slot: CourseMultiMap<'a, EntitySlot<'a>>,
}

/// Trimmed id, or `None` when the value is a sentinel.
pub(crate) fn entity_id(raw: Option<&str>) -> Option<&str> {
    if is_assigned(raw) {
        raw.map(str::trim)
    } else {
        None
    }
}

impl<'a> ScheduleIndex<'a> {
    pub fn build(schedule: &'a [Course]) -> Self {
        let mut index = ScheduleIndex::default();

        for course in schedule.iter().filter(|c| c.is_placed()) {
            index.placed.push(course);

            let Some(slot) = course.slot() else {
                continue;
            };
            index.by_slot.insert(slot, course);

            if let Some(instructor) = entity_id(course.assigned_instructor.as_deref()) {
                index.by_instructor_slot.insert(
                    EntitySlot {
                        entity: instructor,
                        slot,
                    },
                    course,
                );
            }
            if let Some(room) = entity_id(course.room_id.as_deref()) {
                index
                    .by_room_slot
                    .insert(EntitySlot { entity: room, slot }, course);
            }
        }

        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_placed_courses_with_valid_slots_are_indexed() {
        let schedule = vec![
            Course::new("A-1-0", 10).with_instructor("I1").placed("1-1", "R1"),
            Course::new("B-1-0", 10).with_instructor("I1").placed("1-1", "R2"),
            Course::new("C-1-0", 10).with_instructor("I2"),
            Course::new("D-1-0", 10).with_instructor("I2").placed("Mon", "R3"),
            Course::new("E-1-0", 10).placed("none", "R3"),
        ];

        let index = ScheduleIndex::build(&schedule);
        assert_eq!(index.placed.len(), 3);
        assert_eq!(index.by_slot.get(&TimeSlot::new(1, 1)).len(), 2);
        assert_eq!(index.by_slot.len(), 1);

        let key = EntitySlot {
            entity: "I1",
            slot: TimeSlot::new(1, 1),
        };
        assert_eq!(index.by_instructor_slot.get(&key).len(), 2);
        assert_eq!(index.by_instructor_slot.collisions().count(), 1);
        assert_eq!(index.by_room_slot.collisions().count(), 0);
    }

    #[test]
    fn test_unassigned_instructor_is_not_indexed() {
        let schedule = vec![
            Course::new("A-1-0", 10).placed("1-1", "R1"),
            Course {
                assigned_instructor: Some("<>".to_string()),
                ..Course::new("B-1-0", 10).placed("1-1", "R2")
            },
        ];

        let index = ScheduleIndex::build(&schedule);
        assert!(index.by_instructor_slot.is_empty());
        assert_eq!(index.by_room_slot.len(), 2);
    }
}
