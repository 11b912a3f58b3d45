//! Boundary to the external assignment proposer.
//!
//! The pipeline never decides where a course goes by itself: it asks an
//! [`AssignmentProposer`] for concrete `(time_slot, room_id)` pairs and then
//! validates whatever comes back. A proposer that fails or answers with
//! garbage is not fatal; the affected courses are simply left unassigned.
//!
//! Implementations:
//! - [`CommandProposer`]: runs an external program speaking JSON on stdin/stdout
//! - [`RetryingProposer`]: bounded retries with a fixed delay around any proposer
//! - [`ScriptedProposer`]: in-memory replies, for tests and dry runs

use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};
use std::ops::AddAssign;
use std::sync::Arc;

use crate::models::course::{deserialize_id, deserialize_opt_id};
use crate::models::{is_assigned, Course, Instructor, ReferenceData, ViolationKind};

pub mod command;
pub mod reply;
pub mod retry;
pub mod scripted;

pub use command::CommandProposer;
pub use reply::{extract_reply_json, parse_assignments, parse_reply_text};
pub use retry::RetryingProposer;
pub use scripted::ScriptedProposer;

/// Literal time slot a proposer uses to say it found no valid placement.
pub const NO_FIX_FOUND: &str = "NO_FIX_FOUND";

/// Error type for proposer calls
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProposerError {
    #[error("Proposer unavailable: {0}")]
    Unavailable(String),

    #[error("Proposer call failed: {0}")]
    CallFailed(String),

    #[error("Malformed proposer reply: {0}")]
    MalformedReply(String),

    #[error("Proposer gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Token and timing counters for one or more proposer calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallUsage {
    pub calls: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub thinking_tokens: u64,
    pub total_tokens: u64,
    pub seconds: f64,
}

impl AddAssign<&CallUsage> for CallUsage {
    fn add_assign(&mut self, other: &CallUsage) {
        self.calls += other.calls;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.thinking_tokens += other.thinking_tokens;
        self.total_tokens += other.total_tokens;
        self.seconds += other.seconds;
    }
}

/// A proposed placement for one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(deserialize_with = "deserialize_id")]
    pub course_id: String,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub time_slot: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub room_id: Option<String>,
}

impl Assignment {
    pub fn new(
        course_id: impl Into<String>,
        time_slot: impl Into<String>,
        room_id: impl Into<String>,
    ) -> Self {
        Self {
            course_id: course_id.into(),
            time_slot: Some(time_slot.into()),
            room_id: Some(room_id.into()),
        }
    }

    pub fn no_fix(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            time_slot: Some(NO_FIX_FOUND.to_string()),
            room_id: None,
        }
    }

    /// `false` when the slot is a sentinel or the literal [`NO_FIX_FOUND`].
    pub fn is_usable(&self) -> bool {
        is_assigned(self.time_slot.as_deref())
            && self.time_slot.as_deref().map(str::trim) != Some(NO_FIX_FOUND)
    }
}

/// What the proposer is asked to do.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProposalMode {
    /// Place a fresh batch. `roster` holds the instructors it references.
    Generate {
        roster: Vec<Instructor>,
        previously_scheduled: Vec<Course>,
    },
    /// Re-place one course that violates `violations`.
    Fix { violations: Vec<ViolationKind> },
    /// Move one course towards a soft-constraint goal.
    Optimize { goal: String },
}

impl ProposalMode {
    pub fn name(&self) -> &'static str {
        match self {
            ProposalMode::Generate { .. } => "generate",
            ProposalMode::Fix { .. } => "fix",
            ProposalMode::Optimize { .. } => "optimize",
        }
    }
}

#[derive(Serialize)]
struct ReferenceView<'a> {
    constraints: &'a serde_json::Value,
    instructors: &'a [Instructor],
    rooms: &'a [crate::models::Room],
    curriculum: &'a crate::models::Curriculum,
}

fn serialize_reference<S: Serializer>(
    reference: &Arc<ReferenceData>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    ReferenceView {
        constraints: &reference.constraints,
        instructors: &reference.instructors,
        rooms: &reference.rooms,
        curriculum: &reference.curriculum,
    }
    .serialize(serializer)
}

/// Everything a proposer gets for one call. Serializes to the JSON document
/// sent to external proposers.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalRequest {
    /// Short tag identifying the call in logs, e.g. `batch_2/CS101-1-0`.
    pub label: String,
    #[serde(serialize_with = "serialize_reference")]
    pub reference: Arc<ReferenceData>,
    /// Current global schedule snapshot.
    pub schedule: Vec<Course>,
    /// Courses that need an assignment.
    pub targets: Vec<Course>,
    #[serde(flatten)]
    pub mode: ProposalMode,
}

impl ProposalRequest {
    pub fn new(
        label: impl Into<String>,
        reference: Arc<ReferenceData>,
        schedule: Vec<Course>,
        targets: Vec<Course>,
        mode: ProposalMode,
    ) -> Self {
        Self {
            label: label.into(),
            reference,
            schedule,
            targets,
            mode,
        }
    }

    pub fn target_ids(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(|c| c.course_id.as_str())
    }
}

/// Parsed proposer answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProposerReply {
    pub assignments: Vec<Assignment>,
    pub usage: CallUsage,
    /// Unparsed reply text, when the proposer produced one.
    pub raw: Option<String>,
}

impl ProposerReply {
    pub fn new(assignments: Vec<Assignment>) -> Self {
        Self {
            assignments,
            usage: CallUsage::default(),
            raw: None,
        }
    }

    /// The last assignment for `course_id`, if any.
    pub fn assignment_for(&self, course_id: &str) -> Option<&Assignment> {
        self.assignments
            .iter()
            .rev()
            .find(|a| a.course_id.trim() == course_id)
    }

    /// Usable assignment for `course_id`. With a single-target request a
    /// lone assignment is accepted even if its id does not echo the target.
    pub fn usable_for(&self, course_id: &str) -> Option<&Assignment> {
        let found = match self.assignment_for(course_id) {
            Some(a) => Some(a),
            None if self.assignments.len() == 1 => self.assignments.first(),
            None => None,
        };
        found.filter(|a| a.is_usable())
    }
}

/// Source of course placements.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; one proposer is shared by every
/// stage of a run and called from async stage runners.
#[async_trait]
pub trait AssignmentProposer: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    /// Proposes placements for `request.targets`.
    ///
    /// # Returns
    /// * `Ok(ProposerReply)` - Parsed assignments, possibly empty or partial
    /// * `Err(ProposerError)` - The call produced nothing usable
    async fn propose(&self, request: &ProposalRequest) -> Result<ProposerReply, ProposerError>;
}
