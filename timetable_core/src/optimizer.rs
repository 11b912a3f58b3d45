//! Soft-constraint local search over a hard-valid schedule.
//!
//! Candidates come from the instructor gap breakdown: every placed course of
//! an instructor on a day with a gap. Each candidate is offered to the
//! proposer with a plain-language goal. A proposed move is applied to the
//! working schedule, the whole schedule is re-validated, and the move is
//! either kept or rolled back before the next candidate is considered.

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use crate::config::AcceptancePolicy;
use crate::constraints::index::entity_id;
use crate::constraints::{GapDetails, ScheduleValidator};
use crate::io::json::write_schedule;
use crate::io::layout::StageDir;
use crate::io::reports::{BatchReport, BatchStatus, ReportKind, RunReport};
use crate::logging::{EventKind, RunLogger};
use crate::models::{Course, ViolationKind};
use crate::proposer::{Assignment, AssignmentProposer, ProposalMode, ProposalRequest};

pub const OPTIMIZED_SCHEDULE_FILE: &str = "optimized_schedule.json";

/// One course the optimizer will try to move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub course_id: String,
    pub instructor_id: String,
    pub day: i32,
    pub gap: u32,
    pub goal: String,
}

/// Selects every placed course taught by an instructor on a day listed in
/// `gaps`, in instructor, day, schedule order.
pub fn select_candidates(schedule: &[Course], gaps: &GapDetails) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for (instructor_id, days) in gaps {
        for (&day, &gap) in days {
            if gap == 0 {
                continue;
            }
            for course in schedule.iter().filter(|c| c.is_placed()) {
                let teaches = entity_id(course.assigned_instructor.as_deref())
                    == Some(instructor_id.as_str());
                if teaches && course.slot().map(|s| s.day) == Some(day) {
                    candidates.push(Candidate {
                        course_id: course.course_id.clone(),
                        instructor_id: instructor_id.clone(),
                        day,
                        gap,
                        goal: format!(
                            "Reduce {}-period gap for Instructor {} on Day {}",
                            gap, instructor_id, day
                        ),
                    });
                }
            }
        }
    }
    candidates
}

/// Why a candidate move was kept or dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum MoveDecision {
    Accepted { penalty_before: f64, penalty_after: f64 },
    NoProposal,
    Unchanged,
    HardViolation { kinds: Vec<ViolationKind> },
    NoImprovement { penalty_before: f64, penalty_after: f64 },
}

impl MoveDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, MoveDecision::Accepted { .. })
    }
}

/// Applies `assignment` to `schedule[pos]`, re-validates the whole schedule
/// and rolls the course back unless the move is acceptable under `policy`.
///
/// A missing room in the proposal keeps the course's current room.
pub fn try_move(
    schedule: &mut [Course],
    pos: usize,
    assignment: &Assignment,
    validator: &ScheduleValidator,
    policy: AcceptancePolicy,
) -> MoveDecision {
    if !assignment.is_usable() {
        return MoveDecision::NoProposal;
    }

    let previous = (schedule[pos].time_slot.clone(), schedule[pos].room_id.clone());
    let proposed_room = assignment.room_id.clone().or_else(|| previous.1.clone());
    if assignment.time_slot == previous.0 && proposed_room == previous.1 {
        return MoveDecision::Unchanged;
    }

    let penalty_before = validator.validate_soft(schedule).total_weighted_penalty;
    schedule[pos].time_slot = assignment.time_slot.clone();
    schedule[pos].room_id = proposed_room;

    let violations = validator.validate_hard(schedule);
    if !violations.is_clean() {
        let course_id = &schedule[pos].course_id;
        let kinds = violations
            .kinds_for(course_id)
            .map(|k| k.iter().cloned().collect())
            .unwrap_or_default();
        schedule[pos].time_slot = previous.0;
        schedule[pos].room_id = previous.1;
        return MoveDecision::HardViolation { kinds };
    }

    let penalty_after = validator.validate_soft(schedule).total_weighted_penalty;
    if policy == AcceptancePolicy::RequireImprovement && penalty_after >= penalty_before {
        schedule[pos].time_slot = previous.0;
        schedule[pos].room_id = previous.1;
        return MoveDecision::NoImprovement {
            penalty_before,
            penalty_after,
        };
    }

    MoveDecision::Accepted {
        penalty_before,
        penalty_after,
    }
}

/// Result of one optimizer pass.
#[derive(Debug, Clone)]
pub struct OptimizerOutcome {
    pub schedule: Vec<Course>,
    pub decisions: Vec<(Candidate, MoveDecision)>,
    pub initial_penalty: f64,
    pub final_penalty: f64,
    pub report: RunReport,
}

impl OptimizerOutcome {
    pub fn accepted(&self) -> usize {
        self.decisions.iter().filter(|(_, d)| d.is_accepted()).count()
    }

    pub fn rejected(&self) -> usize {
        self.decisions.len() - self.accepted()
    }

    /// Writes `optimized_schedule.json` and `run_report_optimizer.txt`.
    pub fn persist(&self, stage: &StageDir) -> Result<()> {
        write_schedule(&stage.root().join(OPTIMIZED_SCHEDULE_FILE), &self.schedule)?;
        self.report
            .write(&stage.report_path(ReportKind::Optimizer.file_kind()))
    }
}

/// Sequential accept/rollback loop.
pub struct Optimizer<'a, P: ?Sized> {
    proposer: &'a P,
    validator: &'a ScheduleValidator,
    policy: AcceptancePolicy,
    logger: RunLogger,
}

impl<'a, P> Optimizer<'a, P>
where
    P: AssignmentProposer + ?Sized,
{
    pub fn new(
        proposer: &'a P,
        validator: &'a ScheduleValidator,
        policy: AcceptancePolicy,
        logger: &RunLogger,
    ) -> Self {
        Self {
            proposer,
            validator,
            policy,
            logger: logger.for_agent("optimizer"),
        }
    }

    /// Runs one pass over the candidates derived from `schedule`'s current
    /// gap breakdown.
    pub async fn run(&self, mut schedule: Vec<Course>) -> OptimizerOutcome {
        let started = Instant::now();
        self.logger.milestone("--- Optimizer Started ---");

        let initial = self.validator.validate_soft(&schedule);
        let candidates = select_candidates(&schedule, initial.gap_details());
        self.logger.info(&format!(
            "Identified {} optimization candidates.",
            candidates.len()
        ));

        let positions: HashMap<String, usize> = schedule
            .iter()
            .enumerate()
            .map(|(i, c)| (c.course_id.clone(), i))
            .collect();
        let reference = self.validator.reference();

        let mut groups: BTreeMap<(String, i32), BatchReport> = BTreeMap::new();
        let mut decisions = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let Some(&pos) = positions.get(&candidate.course_id) else {
                continue;
            };
            let group = groups
                .entry((candidate.instructor_id.clone(), candidate.day))
                .or_insert_with(|| {
                    BatchReport::new(
                        format!("{}@day{}", candidate.instructor_id, candidate.day),
                        BatchStatus::Processed,
                    )
                });

            let request = ProposalRequest::new(
                candidate.course_id.clone(),
                Arc::clone(reference),
                schedule.clone(),
                vec![schedule[pos].clone()],
                ProposalMode::Optimize {
                    goal: candidate.goal.clone(),
                },
            );

            let decision = match self.proposer.propose(&request).await {
                Ok(reply) => {
                    group.usage += &reply.usage;
                    if let Some(raw) = &reply.raw {
                        self.logger.raw_reply(&candidate.course_id, raw);
                    }
                    match reply.usable_for(&candidate.course_id) {
                        Some(assignment) => {
                            try_move(&mut schedule, pos, assignment, self.validator, self.policy)
                        }
                        None => MoveDecision::NoProposal,
                    }
                }
                Err(e) => {
                    self.logger
                        .error(&format!("Proposer failed for {}: {}", candidate.course_id, e));
                    MoveDecision::NoProposal
                }
            };

            self.log_decision(&candidate, &decision);
            if decision.is_accepted() {
                group.succeeded += 1;
            } else {
                group.failed += 1;
            }
            decisions.push((candidate, decision));
        }

        let final_penalty = self.validator.validate_soft(&schedule).total_weighted_penalty;
        let mut report = RunReport::new(ReportKind::Optimizer, self.proposer.name());
        report.batches = groups.into_values().collect();
        report.duration = started.elapsed();

        self.logger.milestone(&format!(
            "--- Optimizer Finished: {} accepted, {} rejected, penalty {:.2} -> {:.2} ---",
            report.total_succeeded(),
            report.total_failed(),
            initial.total_weighted_penalty,
            final_penalty
        ));

        OptimizerOutcome {
            schedule,
            decisions,
            initial_penalty: initial.total_weighted_penalty,
            final_penalty,
            report,
        }
    }

    fn log_decision(&self, candidate: &Candidate, decision: &MoveDecision) {
        let id = &candidate.course_id;
        match decision {
            MoveDecision::Accepted {
                penalty_before,
                penalty_after,
            } => {
                self.logger.event(
                    EventKind::Info,
                    &format!("Optimization accepted for {}", id),
                    json!({"course_id": id, "penalty_before": penalty_before, "penalty_after": penalty_after}),
                );
                if penalty_after >= penalty_before {
                    self.logger.warning(&format!(
                        "Accepted move for {} did not lower the penalty ({:.2} -> {:.2})",
                        id, penalty_before, penalty_after
                    ));
                }
            }
            MoveDecision::HardViolation { kinds } => self.logger.event(
                EventKind::Warning,
                &format!("Optimization rejected (Hard Violation) for {}", id),
                json!({"course_id": id, "violations": kinds}),
            ),
            MoveDecision::NoImprovement { .. } => self
                .logger
                .info(&format!("Optimization rejected (No Improvement) for {}", id)),
            MoveDecision::NoProposal | MoveDecision::Unchanged => self
                .logger
                .info(&format!("No move proposed for {}", id)),
        }
    }
}
