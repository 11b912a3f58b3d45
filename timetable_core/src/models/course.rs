//! Course records and the "unassigned" sentinel rules.
//!
//! A course record is what flows through every batch file. Besides the fields
//! the engine understands, any extra keys present in the input are carried
//! along untouched so downstream consumers see the same record they wrote.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::time_slot::TimeSlot;
use super::violation::ViolationKind;

/// Marker written into `time_slot` / `room_id` for courses with no placement.
pub const UNASSIGNED_MARKER: &str = "<>";

/// Returns `true` when `value` is a real assignment rather than a sentinel.
///
/// The sentinel set is fixed: missing, empty (after trim), the `<>` marker and
/// the word `none` in any letter case. Nothing else is ever considered
/// unassigned, whatever it looks like.
///
/// # Examples
///
/// ```
/// use timetable_core::models::is_assigned;
///
/// assert!(!is_assigned(None));
/// assert!(!is_assigned(Some(" <> ")));
/// assert!(!is_assigned(Some("None")));
/// assert!(is_assigned(Some("1-2")));
/// ```
pub fn is_assigned(value: Option<&str>) -> bool {
    match value {
        None => false,
        Some(raw) => {
            let clean = raw.trim();
            !(clean.is_empty() || clean == UNASSIGNED_MARKER || clean.eq_ignore_ascii_case("none"))
        }
    }
}

/// Same rule as [`is_assigned`] applied to a raw JSON value: `null` and
/// sentinel strings are unassigned, every non-string value is assigned.
pub fn is_assigned_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => is_assigned(Some(s)),
        _ => true,
    }
}

/// Accepts a JSON string, number or boolean as an identifier-like value.
pub(crate) fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(D::Error::custom(format!(
            "expected a string or number, found {}",
            other
        ))),
    }
}

/// Like [`deserialize_opt_id`] but the value is mandatory.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    deserialize_opt_id(deserializer)?.ok_or_else(|| D::Error::custom("identifier is null"))
}

/// Accepts a non-negative count written as a number or a numeric string.
pub(crate) fn deserialize_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|v| v.min(u32::MAX as u64) as u32)
            .ok_or_else(|| D::Error::custom(format!("invalid count: {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|e| D::Error::custom(format!("invalid count '{}': {}", s, e))),
        other => Err(D::Error::custom(format!("expected a count, found {}", other))),
    }
}

fn deserialize_room_type<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_opt_id(deserializer)?.filter(|s| !s.trim().is_empty()))
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

/// One course section as stored in schedule and batch files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    #[serde(deserialize_with = "deserialize_id")]
    pub course_id: String,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub num_students: u32,
    #[serde(
        default,
        deserialize_with = "deserialize_room_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub required_room_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub assigned_instructor: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub time_slot: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub room_id: Option<String>,
    /// Violations found by the last validation pass.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub hard_violation_types: BTreeSet<ViolationKind>,
    /// Set when the proposer supplied the current assignment during repair.
    #[serde(
        default,
        rename = "fixed_by_proposer",
        alias = "fixed_by_llm_attempt",
        skip_serializing_if = "is_false"
    )]
    pub proposer_touched: bool,
    /// Fields this crate does not interpret, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Course {
    /// Creates an unplaced course with the given id and enrolment.
    pub fn new(course_id: impl Into<String>, num_students: u32) -> Self {
        Self {
            course_id: course_id.into(),
            num_students,
            required_room_type: None,
            assigned_instructor: None,
            time_slot: Some(UNASSIGNED_MARKER.to_string()),
            room_id: Some(UNASSIGNED_MARKER.to_string()),
            hard_violation_types: BTreeSet::new(),
            proposer_touched: false,
            extra: Map::new(),
        }
    }

    pub fn with_instructor(mut self, instructor_id: impl Into<String>) -> Self {
        self.assigned_instructor = Some(instructor_id.into());
        self
    }

    pub fn with_room_type(mut self, room_type: impl Into<String>) -> Self {
        self.required_room_type = Some(room_type.into());
        self
    }

    /// Places the course in `time_slot` / `room_id`.
    pub fn placed(mut self, time_slot: impl Into<String>, room_id: impl Into<String>) -> Self {
        self.assign(time_slot, room_id);
        self
    }

    pub fn assign(&mut self, time_slot: impl Into<String>, room_id: impl Into<String>) {
        self.time_slot = Some(time_slot.into());
        self.room_id = Some(room_id.into());
    }

    /// Resets both placement fields to the unassigned marker.
    pub fn unassign(&mut self) {
        self.time_slot = Some(UNASSIGNED_MARKER.to_string());
        self.room_id = Some(UNASSIGNED_MARKER.to_string());
    }

    /// A course is placed only when both its slot and its room are real.
    pub fn is_placed(&self) -> bool {
        is_assigned(self.time_slot.as_deref()) && is_assigned(self.room_id.as_deref())
    }

    /// The parsed slot, if the course carries a well-formed one.
    pub fn slot(&self) -> Option<TimeSlot> {
        if !is_assigned(self.time_slot.as_deref()) {
            return None;
        }
        TimeSlot::from_raw(self.time_slot.as_deref())
    }

    /// Text before the first `-`; sections of one course share it.
    pub fn base_id(&self) -> &str {
        base_course_id(&self.course_id)
    }

    /// Drops the per-pass violation annotation and the proposer marker.
    pub fn clear_annotations(&mut self) {
        self.hard_violation_types.clear();
        self.proposer_touched = false;
    }

    pub fn has_violations(&self) -> bool {
        !self.hard_violation_types.is_empty()
    }
}

/// Base id of a `"<base>-<section>-<part>"` course id.
pub fn base_course_id(course_id: &str) -> &str {
    course_id.split('-').next().unwrap_or(course_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sentinel_values_are_unassigned() {
        for raw in ["", "   ", "<>", " <> ", "none", "None", "NONE", " nOnE "] {
            assert!(!is_assigned(Some(raw)), "{:?} should be a sentinel", raw);
        }
        assert!(!is_assigned(None));
    }

    #[test]
    fn test_real_values_are_assigned() {
        for raw in ["1-1", "A508", "0", "<none>", "nonexistent", "502045-1-0"] {
            assert!(is_assigned(Some(raw)), "{:?} should be assigned", raw);
        }
    }

    #[test]
    fn test_json_values() {
        assert!(!is_assigned_value(&Value::Null));
        assert!(!is_assigned_value(&serde_json::json!("<>")));
        assert!(is_assigned_value(&serde_json::json!(508)));
        assert!(is_assigned_value(&serde_json::json!(false)));
        assert!(is_assigned_value(&serde_json::json!(["1-1"])));
    }

    #[test]
    fn test_placed_requires_both_fields() {
        let course = Course::new("C1-1-0", 30);
        assert!(!course.is_placed());

        let half = Course {
            room_id: Some("R1".to_string()),
            ..Course::new("C1-1-0", 30)
        };
        assert!(!half.is_placed());

        let full = Course::new("C1-1-0", 30).placed("1-2", "R1");
        assert!(full.is_placed());
        assert_eq!(full.slot(), Some(TimeSlot::new(1, 2)));
    }

    #[test]
    fn test_base_id() {
        assert_eq!(base_course_id("502045-1-0"), "502045");
        assert_eq!(base_course_id("MATH"), "MATH");
        assert_eq!(Course::new("CS101-2-1", 10).base_id(), "CS101");
    }

    #[test]
    fn test_deserialize_numeric_ids_and_extra_fields() {
        let json = r#"{
            "course_id": "502045-1-0",
            "course_name": "Algorithms",
            "num_students": "45",
            "required_room_type": "",
            "assigned_instructor": 1007,
            "time_slot": "<>",
            "room_id": null,
            "fixed_by_llm_attempt": true
        }"#;

        let course: Course = serde_json::from_str(json).unwrap();
        assert_eq!(course.num_students, 45);
        assert_eq!(course.required_room_type, None);
        assert_eq!(course.assigned_instructor.as_deref(), Some("1007"));
        assert_eq!(course.room_id, None);
        assert!(course.proposer_touched);
        assert!(!course.is_placed());
        assert_eq!(course.extra.get("course_name"), Some(&serde_json::json!("Algorithms")));

        let out = serde_json::to_value(&course).unwrap();
        assert_eq!(out["course_name"], "Algorithms");
        assert_eq!(out["fixed_by_proposer"], true);
        assert!(out.get("hard_violation_types").is_none());
    }

    #[test]
    fn test_clear_annotations() {
        let mut course = Course::new("C1-1-0", 30);
        course.hard_violation_types.insert(ViolationKind::RoomCapacity);
        course.proposer_touched = true;
        assert!(course.has_violations());

        course.clear_annotations();
        assert!(!course.has_violations());
        assert!(!course.proposer_touched);
    }

    proptest! {
        #[test]
        fn prop_padded_sentinels_stay_unassigned(
            left in "[ \t]{0,3}",
            right in "[ \t]{0,3}",
            word in prop::sample::select(vec!["", "<>", "none", "None", "NONE", "nOne"]),
        ) {
            let raw = format!("{}{}{}", left, word, right);
            prop_assert!(!is_assigned(Some(&raw)));
        }

        #[test]
        fn prop_alphanumeric_values_are_assigned(s in "[A-Za-z0-9][A-Za-z0-9-]{0,10}") {
            prop_assume!(!s.eq_ignore_ascii_case("none"));
            prop_assert!(is_assigned(Some(&s)));
        }
    }
}
