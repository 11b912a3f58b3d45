use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of hard-constraint violation attached to a course.
///
/// Serialized as the human-readable label used in every persisted report
/// (e.g. `"Instructor Conflict"`). Labels this build does not know about are
/// kept verbatim so annotated files from other tools still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ViolationKind {
    InstructorConflict,
    RoomConflict,
    RoomCapacity,
    RoomType,
    InstructorAvailability,
    RoomAvailability,
    InstructorDailyLoad,
    IntraSemesterConflict,
    /// Left without a placement after a failed proposal.
    Unplaced,
    Other(String),
}

impl ViolationKind {
    /// Every kind the hard validator can emit, in check order.
    pub const ALL: [ViolationKind; 9] = [
        ViolationKind::InstructorConflict,
        ViolationKind::RoomConflict,
        ViolationKind::RoomCapacity,
        ViolationKind::RoomType,
        ViolationKind::InstructorAvailability,
        ViolationKind::RoomAvailability,
        ViolationKind::InstructorDailyLoad,
        ViolationKind::IntraSemesterConflict,
        ViolationKind::Unplaced,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ViolationKind::InstructorConflict => "Instructor Conflict",
            ViolationKind::RoomConflict => "Room Conflict",
            ViolationKind::RoomCapacity => "Room Capacity",
            ViolationKind::RoomType => "Room Type",
            ViolationKind::InstructorAvailability => "Instructor Availability",
            ViolationKind::RoomAvailability => "Room Availability",
            ViolationKind::InstructorDailyLoad => "Instructor Daily Load",
            ViolationKind::IntraSemesterConflict => "Intra-Semester Conflict",
            ViolationKind::Unplaced => "Unplaced",
            ViolationKind::Other(label) => label,
        }
    }
}

impl From<String> for ViolationKind {
    fn from(label: String) -> Self {
        ViolationKind::ALL
            .iter()
            .find(|kind| kind.as_str() == label.trim())
            .cloned()
            .unwrap_or(ViolationKind::Other(label))
    }
}

impl From<ViolationKind> for String {
    fn from(kind: ViolationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
