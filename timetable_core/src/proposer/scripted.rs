//! In-memory proposer with pre-recorded answers.
//!
//! Answers are consumed in this order: a per-course script for the request's
//! targets, then the shared reply queue, then an empty reply (which every
//! caller treats as "no fix found").

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::{AssignmentProposer, Assignment, ProposalRequest, ProposerError, ProposerReply};

/// What a recorded call looked like.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub label: String,
    pub mode: &'static str,
    pub targets: Vec<String>,
}

#[derive(Default)]
struct ScriptedData {
    queue: VecDeque<Result<Vec<Assignment>, ProposerError>>,
    by_course: HashMap<String, VecDeque<Assignment>>,
    calls: Vec<RecordedCall>,
}

/// Proposer that replays scripted answers.
///
/// # Example
/// ```
/// use timetable_core::proposer::{Assignment, ScriptedProposer};
///
/// let proposer = ScriptedProposer::new();
/// proposer.script_course(Assignment::new("CS101-1-0", "2-3", "A508"));
/// assert_eq!(proposer.call_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct ScriptedProposer {
    data: Arc<RwLock<ScriptedData>>,
}

impl ScriptedProposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the next call not covered by a per-course script.
    pub fn push_reply(&self, assignments: Vec<Assignment>) {
        self.data.write().queue.push_back(Ok(assignments));
    }

    pub fn push_failure(&self, error: ProposerError) {
        self.data.write().queue.push_back(Err(error));
    }

    /// Queues `assignment` for the next request targeting its course.
    pub fn script_course(&self, assignment: Assignment) {
        self.data.write()
            .by_course
            .entry(assignment.course_id.clone())
            .or_default()
            .push_back(assignment);
    }

    pub fn call_count(&self) -> usize {
        self.data.read().calls.len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.data.read().calls.clone()
    }
}

fn one_call(assignments: Vec<Assignment>) -> ProposerReply {
    let mut reply = ProposerReply::new(assignments);
    reply.usage.calls = 1;
    reply
}

#[async_trait]
impl AssignmentProposer for ScriptedProposer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn propose(&self, request: &ProposalRequest) -> Result<ProposerReply, ProposerError> {
        let mut data = self.data.write();
        data.calls.push(RecordedCall {
            label: request.label.clone(),
            mode: request.mode.name(),
            targets: request.target_ids().map(str::to_string).collect(),
        });

        let scripted: Vec<Assignment> = request
            .target_ids()
            .filter_map(|id| data.by_course.get_mut(id).and_then(VecDeque::pop_front))
            .collect();
        if !scripted.is_empty() {
            return Ok(one_call(scripted));
        }

        match data.queue.pop_front() {
            Some(Ok(assignments)) => Ok(one_call(assignments)),
            Some(Err(e)) => Err(e),
            None => Ok(one_call(Vec::new())),
        }
    }
}
