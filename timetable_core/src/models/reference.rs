//! Static reference data: instructors, rooms, the course catalogue and the
//! curriculum. Loaded once per stage and shared read-only by every
//! validation pass.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use super::course::{base_course_id, deserialize_count, deserialize_id, Course};
use super::time_slot::TimeSlot;

/// Daily load cap used when an instructor record does not set one.
pub const DEFAULT_MAX_COURSES_PER_DAY: u32 = 4;

/// The set of slots an instructor or room can be used in.
///
/// An empty set means "no restriction". Entries are normalised so that
/// `"1 - 3"` and `"1-3"` compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailableTimes(BTreeSet<String>);

fn normalize_slot(raw: &str) -> String {
    match raw.parse::<TimeSlot>() {
        Ok(slot) => slot.to_string(),
        Err(_) => raw.trim().to_string(),
    }
}

impl AvailableTimes {
    pub fn new<I, S>(slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            slots
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .map(|s| normalize_slot(&s))
                .collect(),
        )
    }

    /// Parses the `;`-separated form used by the reference files.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(';'))
    }

    pub fn is_unconstrained(&self) -> bool {
        self.0.is_empty()
    }

    /// `true` when the set is empty or contains `slot`.
    pub fn permits(&self, slot: &str) -> bool {
        self.is_unconstrained() || self.0.contains(&normalize_slot(slot))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Serialize for AvailableTimes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let joined = self.0.iter().cloned().collect::<Vec<_>>().join("; ");
        serializer.serialize_str(&joined)
    }
}

impl<'de> Deserialize<'de> for AvailableTimes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        match Value::deserialize(deserializer)? {
            Value::Null => Ok(AvailableTimes::default()),
            Value::String(s) => Ok(AvailableTimes::parse(&s)),
            Value::Array(items) => {
                let mut slots = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => slots.push(s),
                        other => {
                            return Err(D::Error::custom(format!(
                                "available_times entries must be strings, found {}",
                                other
                            )))
                        }
                    }
                }
                Ok(AvailableTimes::new(slots))
            }
            other => Err(D::Error::custom(format!(
                "available_times must be a string or list, found {}",
                other
            ))),
        }
    }
}

fn default_max_courses_per_day() -> u32 {
    DEFAULT_MAX_COURSES_PER_DAY
}

fn deserialize_max_per_day<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(DEFAULT_MAX_COURSES_PER_DAY),
        Some(v) => deserialize_count(v).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructor {
    #[serde(deserialize_with = "deserialize_id")]
    pub instructor_id: String,
    #[serde(default)]
    pub available_times: AvailableTimes,
    #[serde(
        default = "default_max_courses_per_day",
        deserialize_with = "deserialize_max_per_day"
    )]
    pub max_courses_per_day: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Instructor {
    pub fn new(instructor_id: impl Into<String>) -> Self {
        Self {
            instructor_id: instructor_id.into(),
            available_times: AvailableTimes::default(),
            max_courses_per_day: DEFAULT_MAX_COURSES_PER_DAY,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_available_times(mut self, times: AvailableTimes) -> Self {
        self.available_times = times;
        self
    }

    pub fn with_max_courses_per_day(mut self, max: u32) -> Self {
        self.max_courses_per_day = max;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    #[serde(deserialize_with = "deserialize_id")]
    pub room_id: String,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub room_capacity: u32,
    #[serde(default)]
    pub room_type: String,
    #[serde(default)]
    pub available_times: AvailableTimes,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Room {
    pub fn new(room_id: impl Into<String>, room_capacity: u32, room_type: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            room_capacity,
            room_type: room_type.into(),
            available_times: AvailableTimes::default(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_available_times(mut self, times: AvailableTimes) -> Self {
        self.available_times = times;
        self
    }
}

/// A curriculum entry: either a bare course id or an object carrying one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CurriculumEntry {
    Id(String),
    Record {
        #[serde(deserialize_with = "deserialize_id")]
        course_id: String,
    },
}

impl CurriculumEntry {
    pub fn course_id(&self) -> &str {
        match self {
            CurriculumEntry::Id(id) => id,
            CurriculumEntry::Record { course_id } => course_id,
        }
    }
}

/// Semester label → course base ids taught in that semester.
pub type Curriculum = HashMap<String, Vec<CurriculumEntry>>;

/// Read-only lookup tables used by the validator and passed to the proposer.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub instructors: Vec<Instructor>,
    pub rooms: Vec<Room>,
    pub courses: Vec<Course>,
    pub curriculum: Curriculum,
    /// Free-form constraint description forwarded to the proposer verbatim.
    pub constraints: Value,
    instructor_index: HashMap<String, usize>,
    room_index: HashMap<String, usize>,
    course_index: HashMap<String, usize>,
    semester_index: HashMap<String, String>,
}

impl ReferenceData {
    /// Builds the lookup maps. Later duplicates win, matching a plain
    /// id → record map built in file order.
    pub fn new(
        instructors: Vec<Instructor>,
        rooms: Vec<Room>,
        courses: Vec<Course>,
        curriculum: Curriculum,
    ) -> Self {
        let instructor_index = instructors
            .iter()
            .enumerate()
            .map(|(i, inst)| (inst.instructor_id.clone(), i))
            .collect();
        let room_index = rooms
            .iter()
            .enumerate()
            .map(|(i, room)| (room.room_id.clone(), i))
            .collect();
        let course_index = courses
            .iter()
            .enumerate()
            .map(|(i, course)| (course.course_id.clone(), i))
            .collect();

        // Semester labels are visited in sorted order so that a course listed
        // under two semesters resolves the same way on every run.
        let mut semesters: Vec<&String> = curriculum.keys().collect();
        semesters.sort();
        let mut semester_index = HashMap::new();
        for semester in semesters {
            for entry in &curriculum[semester] {
                semester_index.insert(entry.course_id().to_string(), semester.clone());
            }
        }

        Self {
            instructors,
            rooms,
            courses,
            curriculum,
            constraints: Value::Null,
            instructor_index,
            room_index,
            course_index,
            semester_index,
        }
    }

    pub fn with_constraints(mut self, constraints: Value) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn instructor(&self, id: &str) -> Option<&Instructor> {
        self.instructor_index.get(id).map(|&i| &self.instructors[i])
    }

    pub fn room(&self, id: &str) -> Option<&Room> {
        self.room_index.get(id).map(|&i| &self.rooms[i])
    }

    pub fn course(&self, id: &str) -> Option<&Course> {
        self.course_index.get(id).map(|&i| &self.courses[i])
    }

    /// Semester of a course, looked up by the base id of `course_id`.
    pub fn semester_of(&self, course_id: &str) -> Option<&str> {
        self.semester_index
            .get(base_course_id(course_id))
            .map(String::as_str)
    }
}
