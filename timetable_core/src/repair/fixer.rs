//! Fixer step: re-places the courses a validation pass flagged.

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::io::json::write_schedule;
use crate::io::layout::StageDir;
use crate::io::reports::{BatchReport, BatchStatus, ReportKind, RunReport};
use crate::io::write_batches;
use crate::logging::{EventKind, RunLogger};
use crate::models::{flatten_batches, Batch, ReferenceData, ViolationKind, UNASSIGNED_MARKER};
use crate::proposer::{AssignmentProposer, ProposalMode, ProposalRequest};

/// Batches after one fixer pass plus the stage report.
#[derive(Debug, Clone)]
pub struct FixOutcome {
    pub batches: Vec<Batch>,
    pub report: RunReport,
}

impl FixOutcome {
    pub fn fixed(&self) -> usize {
        self.report.total_succeeded()
    }

    pub fn failed(&self) -> usize {
        self.report.total_failed()
    }

    /// Writes the working batches, the consolidated schedule and
    /// `run_report_fixer.txt` into `stage`.
    pub fn persist(&self, stage: &StageDir) -> Result<()> {
        write_batches(&stage.working_dir(), &self.batches)?;
        write_schedule(&stage.consolidated_path(), &flatten_batches(&self.batches))?;
        self.report
            .write(&stage.report_path(ReportKind::Fixer.file_kind()))
    }
}

/// Runs one fixer pass over annotated `batches`.
///
/// For every batch, the courses carrying violation annotations are first all
/// reset to the unassigned marker, then offered to the proposer one at a
/// time together with the current global schedule. A usable answer places
/// the course, marks it as proposer-touched and clears its annotation. Any
/// other outcome leaves it unassigned with its annotation intact, which keeps
/// it violating for the next validation pass.
///
/// Proposer errors never abort the pass; they are counted as failures.
pub async fn run_fixer<P>(
    proposer: &P,
    reference: &Arc<ReferenceData>,
    mut batches: Vec<Batch>,
    logger: &RunLogger,
) -> FixOutcome
where
    P: AssignmentProposer + ?Sized,
{
    let started = Instant::now();
    logger.milestone("--- Fixer Started ---");
    let mut report = RunReport::new(ReportKind::Fixer, proposer.name());

    for b in 0..batches.len() {
        let name = batches[b].name();
        logger.info(&format!("Scanning {} for violations...", name));

        let targets: Vec<usize> = batches[b]
            .courses
            .iter()
            .enumerate()
            .filter(|(_, c)| c.has_violations())
            .map(|(i, _)| i)
            .collect();

        if targets.is_empty() {
            report
                .batches
                .push(BatchReport::new(name, BatchStatus::SkippedClean));
            continue;
        }

        for &i in &targets {
            batches[b].courses[i].unassign();
        }

        let mut batch_report = BatchReport::new(name.clone(), BatchStatus::Processed);
        for &i in &targets {
            let course = batches[b].courses[i].clone();
            let label = format!("{}/{}", name, course.course_id);
            let request = ProposalRequest::new(
                label.clone(),
                Arc::clone(reference),
                flatten_batches(&batches),
                vec![course.clone()],
                ProposalMode::Fix {
                    violations: course.hard_violation_types.iter().cloned().collect(),
                },
            );

            let reply = match proposer.propose(&request).await {
                Ok(reply) => reply,
                Err(e) => {
                    logger.event(
                        EventKind::Error,
                        &format!("Proposer failed for {}: {}", label, e),
                        json!({"batch_id": name, "course_id": course.course_id}),
                    );
                    batch_report.failed += 1;
                    continue;
                }
            };
            batch_report.usage += &reply.usage;
            if let Some(raw) = &reply.raw {
                logger.raw_reply(&label, raw);
            }

            match reply.usable_for(&course.course_id) {
                Some(assignment) => {
                    let target = &mut batches[b].courses[i];
                    target.time_slot = assignment.time_slot.clone();
                    target.room_id = Some(
                        assignment
                            .room_id
                            .clone()
                            .unwrap_or_else(|| UNASSIGNED_MARKER.to_string()),
                    );
                    target.proposer_touched = true;
                    target.hard_violation_types.clear();
                    if target.is_placed() {
                        batch_report.succeeded += 1;
                    } else {
                        target.hard_violation_types.insert(ViolationKind::Unplaced);
                        logger.warning(&format!("Fix for {} has no room", label));
                        batch_report.failed += 1;
                    }
                }
                None => {
                    logger.warning(&format!("No fix found for {}", label));
                    batch_report.failed += 1;
                }
            }
        }

        logger.event(
            EventKind::Info,
            &format!(
                "{}: {} fixed, {} failed",
                name, batch_report.succeeded, batch_report.failed
            ),
            json!({"batch_id": name, "calls": batch_report.usage.calls}),
        );
        report.batches.push(batch_report);
    }

    report.duration = started.elapsed();
    logger.milestone(&format!(
        "--- Fixer Finished: {} fixed, {} failed ---",
        report.total_succeeded(),
        report.total_failed()
    ));

    FixOutcome { batches, report }
}
