//! Generation step: first placement of the initial batches.

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::io::json::write_schedule;
use crate::io::layout::StageDir;
use crate::io::reports::{BatchReport, BatchStatus, ReportKind, RunReport};
use crate::io::write_batches;
use crate::logging::{EventKind, RunLogger};
use crate::models::{
    flatten_batches, Batch, Course, ReferenceData, ViolationKind, UNASSIGNED_MARKER,
};
use crate::processing::InitialBatch;
use crate::proposer::{AssignmentProposer, ProposalMode, ProposalRequest, ProposerReply};

/// Populated batches plus the stage report.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub batches: Vec<Batch>,
    pub report: RunReport,
}

impl GenerateOutcome {
    pub fn consolidated(&self) -> Vec<Course> {
        flatten_batches(&self.batches)
    }

    /// Writes the working batches, the consolidated schedule and
    /// `run_report_generator.txt` into `stage`.
    pub fn persist(&self, stage: &StageDir) -> Result<()> {
        write_batches(&stage.working_dir(), &self.batches)?;
        write_schedule(&stage.consolidated_path(), &self.consolidated())?;
        self.report
            .write(&stage.report_path(ReportKind::Generator.file_kind()))
    }
}

/// Copies each returned placement onto its course. A "no fix found" answer
/// leaves the course unassigned.
fn apply_reply(courses: &mut [Course], reply: &ProposerReply) {
    for course in courses {
        let Some(assignment) = reply.assignment_for(&course.course_id) else {
            continue;
        };
        if !assignment.is_usable() {
            course.unassign();
            continue;
        }
        course.time_slot = assignment.time_slot.clone();
        course.room_id = Some(
            assignment
                .room_id
                .clone()
                .unwrap_or_else(|| UNASSIGNED_MARKER.to_string()),
        );
    }
}

/// Asks the proposer to place every initial batch, in index order.
///
/// Each request carries the batch's courses, its instructor roster and every
/// course generated so far. A batch whose call fails, or whose reply holds
/// no assignment at all, keeps its unassigned markers and is reported as
/// failed; later batches still run. Every course left unplaced is annotated
/// as [`ViolationKind::Unplaced`] so the fixer picks it up.
pub async fn run_generator<P>(
    proposer: &P,
    reference: &Arc<ReferenceData>,
    mut initial: Vec<InitialBatch>,
    logger: &RunLogger,
) -> GenerateOutcome
where
    P: AssignmentProposer + ?Sized,
{
    let started = Instant::now();
    logger.milestone("--- Generator Started ---");
    let mut report = RunReport::new(ReportKind::Generator, proposer.name());

    initial.sort_by_key(|b| b.batch.index);
    let mut generated: Vec<Batch> = Vec::with_capacity(initial.len());

    for InitialBatch { mut batch, roster } in initial {
        let name = batch.name();
        logger.milestone(&format!("Processing {}", name));

        let previously_scheduled = flatten_batches(&generated);
        let request = ProposalRequest::new(
            name.clone(),
            Arc::clone(reference),
            previously_scheduled.clone(),
            batch.courses.clone(),
            ProposalMode::Generate {
                roster,
                previously_scheduled,
            },
        );

        let mut batch_report = BatchReport::new(name.clone(), BatchStatus::Processed);
        match proposer.propose(&request).await {
            Ok(reply) => {
                batch_report.usage += &reply.usage;
                if let Some(raw) = &reply.raw {
                    logger.raw_reply(&name, raw);
                }
                if reply.assignments.is_empty() {
                    batch_report.status = BatchStatus::Failed("no assignments".to_string());
                    logger.error(&format!("{} failed or returned invalid structure.", name));
                } else {
                    apply_reply(&mut batch.courses, &reply);
                }
            }
            Err(e) => {
                batch_report.status = BatchStatus::Failed(e.to_string());
                logger.event(
                    EventKind::Error,
                    &format!("{} failed: {}", name, e),
                    json!({"batch_id": name}),
                );
            }
        }

        for course in batch.courses.iter_mut().filter(|c| !c.is_placed()) {
            course.hard_violation_types.insert(ViolationKind::Unplaced);
        }
        batch_report.succeeded = batch.courses.iter().filter(|c| c.is_placed()).count();
        batch_report.failed = batch.len() - batch_report.succeeded;
        report.batches.push(batch_report);
        generated.push(batch);
    }

    report.duration = started.elapsed();
    logger.milestone(&format!(
        "--- Generator Finished: {} placed, {} unplaced ---",
        report.total_succeeded(),
        report.total_failed()
    ));

    GenerateOutcome {
        batches: generated,
        report,
    }
}
