//! Hierarchical hard-constraint repair.
//!
//! ```text
//! Generating → Fixing(1) → Fixed | BudgetExhausted → Merging(1) → Fixing(2) → … → Done
//! ```
//!
//! Each level validates its batches, hands violating courses to the fixer
//! and re-validates, at most `max_fixer_iterations_per_level` times. A level
//! that is still dirty when the budget runs out is validated once more and
//! then merged anyway. A level whose only violations span batches is merged
//! without spending fixer passes. The loop ends when a level holds a single
//! batch.

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use super::fixer::run_fixer;
use super::generator::run_generator;
use crate::config::RepairSettings;
use crate::constraints::{BatchValidation, ScheduleValidator};
use crate::io::layout::StageDir;
use crate::io::reports::write_validation_outputs;
use crate::logging::{EventKind, RunLogger};
use crate::models::{flatten_batches, Batch, Course};
use crate::processing::{merge_batches, persist_merge, InitialBatch};
use crate::proposer::AssignmentProposer;

/// Stem used for the validation of a level's consolidated schedule.
pub const CONSOLIDATED_STEM: &str = "consolidated_schedule";

/// Controller states, recorded in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RepairState {
    Generating,
    Fixing { level: usize },
    Fixed { level: usize },
    BudgetExhausted { level: usize },
    Merging { level: usize },
    Done,
}

impl fmt::Display for RepairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairState::Generating => f.write_str("GENERATING"),
            RepairState::Fixing { level } => write!(f, "FIXING({})", level),
            RepairState::Fixed { level } => write!(f, "FIXED({})", level),
            RepairState::BudgetExhausted { level } => write!(f, "BUDGET_EXHAUSTED({})", level),
            RepairState::Merging { level } => write!(f, "MERGING({})", level),
            RepairState::Done => f.write_str("DONE"),
        }
    }
}

/// What happened at one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelReport {
    pub level: usize,
    pub batch_count: usize,
    /// Fixer passes run at this level.
    pub iterations: usize,
    /// Violating course count of every validation pass, in order.
    pub violations_per_pass: Vec<usize>,
    pub fixed: usize,
    pub failed: usize,
    pub budget_exhausted: bool,
}

impl LevelReport {
    fn new(level: usize, batch_count: usize) -> Self {
        Self {
            level,
            batch_count,
            iterations: 0,
            violations_per_pass: Vec::new(),
            fixed: 0,
            failed: 0,
            budget_exhausted: false,
        }
    }

    /// Violating count after the last validation pass of the level.
    pub fn remaining(&self) -> usize {
        self.violations_per_pass.last().copied().unwrap_or(0)
    }
}

/// Result of the hard-constraint phase.
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    /// The single batch left at the last level, annotated by its final pass.
    pub final_batch: Batch,
    pub trace: Vec<RepairState>,
    pub levels: Vec<LevelReport>,
    /// Stage holding the last persisted artifacts, when output is enabled.
    pub final_stage: Option<StageDir>,
}

impl RepairOutcome {
    pub fn schedule(&self) -> &[Course] {
        &self.final_batch.courses
    }

    pub fn remaining_violations(&self) -> usize {
        self.final_batch.violating_count()
    }

    pub fn is_clean(&self) -> bool {
        self.remaining_violations() == 0
    }
}

/// Drives generation, fixing and merging.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use timetable_core::config::RepairSettings;
/// use timetable_core::constraints::ScheduleValidator;
/// use timetable_core::logging::RunLogger;
/// use timetable_core::models::{Batch, ReferenceData};
/// use timetable_core::proposer::ScriptedProposer;
/// use timetable_core::repair::RepairController;
///
/// # async fn demo(reference: ReferenceData, batches: Vec<Batch>) -> anyhow::Result<()> {
/// let validator = ScheduleValidator::new(Arc::new(reference));
/// let proposer = ScriptedProposer::new();
/// let logger = RunLogger::console("controller", "demo");
///
/// let outcome = RepairController::new(&proposer, &validator, RepairSettings::default(), &logger)
///     .with_output("output/demo")
///     .repair(batches, None)
///     .await?;
/// println!("{} violations left", outcome.remaining_violations());
/// # Ok(())
/// # }
/// ```
pub struct RepairController<'a, P: ?Sized> {
    proposer: &'a P,
    validator: &'a ScheduleValidator,
    settings: RepairSettings,
    logger: RunLogger,
    generator_log: RunLogger,
    fixer_log: RunLogger,
    output_root: Option<PathBuf>,
}

impl<'a, P> RepairController<'a, P>
where
    P: AssignmentProposer + ?Sized,
{
    pub fn new(
        proposer: &'a P,
        validator: &'a ScheduleValidator,
        settings: RepairSettings,
        logger: &RunLogger,
    ) -> Self {
        Self {
            proposer,
            validator,
            settings,
            logger: logger.for_agent("controller"),
            generator_log: logger.for_agent("generator"),
            fixer_log: logger.for_agent("fixer"),
            output_root: None,
        }
    }

    /// Persist every stage under `root` (one directory per stage).
    pub fn with_output(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = Some(root.into());
        self
    }

    fn stage(&self, name: &str, tag: &str) -> Result<Option<StageDir>> {
        match &self.output_root {
            Some(root) => Ok(Some(StageDir::create(root, name, tag)?)),
            None => Ok(None),
        }
    }

    /// Populates `initial` through the proposer, then repairs the result.
    pub async fn generate_and_repair(&self, initial: Vec<InitialBatch>) -> Result<RepairOutcome> {
        self.logger.milestone("--- Generation Phase ---");
        let generated = run_generator(
            self.proposer,
            self.validator.reference(),
            initial,
            &self.generator_log,
        )
        .await;

        let stage = self.stage("generator", "initial")?;
        if let Some(stage) = &stage {
            generated.persist(stage)?;
        }

        let mut outcome = self.repair(generated.batches, stage).await?;
        outcome.trace.insert(0, RepairState::Generating);
        Ok(outcome)
    }

    /// Runs the level loop starting at level 1 with already placed
    /// `batches`. `stage` is where those batches were persisted, if anywhere.
    pub async fn repair(
        &self,
        mut batches: Vec<Batch>,
        mut stage: Option<StageDir>,
    ) -> Result<RepairOutcome> {
        let budget = self.settings.max_fixer_iterations_per_level;
        let mut trace = Vec::new();
        let mut levels = Vec::new();
        let mut level = 1;

        loop {
            trace.push(RepairState::Fixing { level });
            self.logger.milestone(&format!(
                "--- Level {}: {} batches ---",
                level,
                batches.len()
            ));
            let mut report = LevelReport::new(level, batches.len());
            let mut clean = false;
            let mut deferred = false;

            for run in 1..=budget {
                let (total, annotated) = self.validate_level(&batches, stage.as_ref())?;
                batches = annotated;
                report.violations_per_pass.push(total);
                if total == 0 {
                    clean = true;
                    break;
                }
                if batches.iter().all(|b| b.violating_count() == 0) {
                    // only cross-batch conflicts left; the fixer sees none of them
                    self.logger.info(&format!(
                        "Level {}: {} courses conflict across batches, deferring to the merge",
                        level, total
                    ));
                    deferred = true;
                    break;
                }

                self.logger.info(&format!(
                    "Level {} run {}/{}: {} violating courses, running fixer",
                    level, run, budget, total
                ));
                let fix = run_fixer(
                    self.proposer,
                    self.validator.reference(),
                    batches,
                    &self.fixer_log,
                )
                .await;
                report.iterations += 1;
                report.fixed += fix.fixed();
                report.failed += fix.failed();

                if let Some(next) = self.stage("fixer", &format!("L{}_fix_run{}", level, run))? {
                    fix.persist(&next)?;
                    stage = Some(next);
                }
                batches = fix.batches;
            }

            if clean {
                self.logger.milestone(&format!("Level {} fully fixed", level));
                trace.push(RepairState::Fixed { level });
            } else {
                trace.push(RepairState::BudgetExhausted { level });
                report.budget_exhausted = true;
                if !deferred {
                    let (total, annotated) = self.validate_level(&batches, stage.as_ref())?;
                    batches = annotated;
                    report.violations_per_pass.push(total);
                }
                let total = report.remaining();
                self.logger.event(
                    EventKind::Warning,
                    &format!(
                        "Level {} not fully fixed after {} fixer runs; {} violating courses remain",
                        level, budget, total
                    ),
                    json!({"level": level, "remaining": total}),
                );
            }
            levels.push(report);

            if batches.len() <= 1 {
                trace.push(RepairState::Done);
                break;
            }

            trace.push(RepairState::Merging { level });
            let merged = merge_batches(batches);
            self.logger.info(&format!(
                "Merged level {} into {} batches",
                level,
                merged.batches.len()
            ));
            if let Some(next) =
                self.stage("merger", &format!("L{}_merge_to_L{}", level, level + 1))?
            {
                persist_merge(&next, &merged)?;
                stage = Some(next);
            }
            batches = merged.batches;
            level += 1;
        }

        let final_batch = batches
            .into_iter()
            .next()
            .unwrap_or_else(|| Batch::new(1, Vec::new()));
        self.logger.milestone(&format!(
            "--- Repair Done: {} courses, {} still violating ---",
            final_batch.len(),
            final_batch.violating_count()
        ));

        Ok(RepairOutcome {
            final_batch,
            trace,
            levels,
            final_stage: stage,
        })
    }

    /// Validates every batch, annotating copies, and returns the number of
    /// distinct violating courses at the level.
    ///
    /// When consolidated validation is on, courses that only violate against
    /// courses of other batches are counted too; they stay unannotated in
    /// their batch, so the fixer leaves them for a later level.
    fn validate_level(
        &self,
        batches: &[Batch],
        stage: Option<&StageDir>,
    ) -> Result<(usize, Vec<Batch>)> {
        let mut flagged: BTreeSet<String> = BTreeSet::new();
        let mut annotated = Vec::with_capacity(batches.len());

        for BatchValidation { batch, violations } in self.validator.validate_batches(batches) {
            if let Some(stage) = stage {
                let stem = batch.name();
                let source = stage.working_dir().join(format!("{}.json", stem));
                write_validation_outputs(stage, &stem, &source, &batch.courses, &violations)?;
            }
            flagged.extend(violations.violating_ids);
            annotated.push(batch);
        }

        let mut total = flagged.len();
        if self.settings.validate_consolidated || stage.is_some() {
            let consolidated = flatten_batches(&annotated);
            let (copy, violations) = self.validator.validate_and_annotate(&consolidated);
            if let Some(stage) = stage {
                write_validation_outputs(
                    stage,
                    CONSOLIDATED_STEM,
                    &stage.consolidated_path(),
                    &copy,
                    &violations,
                )?;
            }
            if self.settings.validate_consolidated {
                total += violations
                    .violating_ids
                    .iter()
                    .filter(|id| !flagged.contains(*id))
                    .count();
            }
        }

        Ok((total, annotated))
    }
}
