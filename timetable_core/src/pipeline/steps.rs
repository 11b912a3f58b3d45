//! Individual pipeline stages. Each one reads and writes a stage directory
//! and can be run on its own.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::PipelineConfig;
use crate::constraints::{ScheduleValidator, SoftReport};
use crate::io::json::read_schedule;
use crate::io::layout::StageDir;
use crate::io::reports::{write_soft_validation, write_validation_outputs};
use crate::logging::RunLogger;
use crate::models::{Course, ReferenceData};
use crate::optimizer::Optimizer;
use crate::processing::{
    clean_and_analyze, prepare_initial_batches, write_initial_batches, write_rebatched,
    CleanOutcome, InitialBatch,
};
use crate::proposer::AssignmentProposer;
use crate::repair::CONSOLIDATED_STEM;

/// Splits the reference courses into initial batches and writes them under
/// the data directory.
pub fn run_dataprep(
    config: &PipelineConfig,
    reference: &ReferenceData,
    logger: &RunLogger,
) -> Result<Vec<InitialBatch>> {
    let batch_size = config.batching.batch_size;
    logger.milestone(&format!(
        "--- Data Prep: {} courses, batch size {} ---",
        reference.courses.len(),
        batch_size
    ));

    let batches = prepare_initial_batches(reference.courses.clone(), &reference.instructors, batch_size);
    let (courses_dir, _) = write_initial_batches(&config.paths.data_dir, batch_size, &batches)?;
    logger.info(&format!(
        "Wrote {} batches to {}",
        batches.len(),
        courses_dir.display()
    ));
    Ok(batches)
}

/// Hard-validates the consolidated schedule of `stage` and writes its
/// validation outputs. Returns the number of violating courses.
pub fn validate_stage(validator: &ScheduleValidator, stage: &StageDir, logger: &RunLogger) -> Result<usize> {
    let source = stage.consolidated_path();
    let schedule = read_schedule(&source)
        .with_context(|| format!("Stage {} has no consolidated schedule", stage.root().display()))?;

    let (annotated, violations) = validator.validate_and_annotate(&schedule);
    write_validation_outputs(stage, CONSOLIDATED_STEM, &source, &annotated, &violations)?;
    logger.info(&format!(
        "Validated {}: {} violating courses",
        source.display(),
        violations.violating_count()
    ));
    Ok(violations.violating_count())
}

/// Hard and soft validation of `schedule`, written to the stage's
/// `sc_validation_output/`.
pub fn run_soft_validation(
    validator: &ScheduleValidator,
    stage: &StageDir,
    schedule: &[Course],
    logger: &RunLogger,
) -> Result<SoftReport> {
    let (annotated, violations) = validator.validate_and_annotate(schedule);
    let soft = validator.validate_soft(&annotated);
    let path = write_soft_validation(stage, &annotated, &violations, &soft)?;

    if !violations.is_clean() {
        logger.warning(&format!(
            "{} courses violate hard constraints before optimization",
            violations.violating_count()
        ));
    }
    logger.info(&format!(
        "Soft penalty {:.2} written to {}",
        soft.total_weighted_penalty,
        path.display()
    ));
    Ok(soft)
}

/// What the soft-constraint phase produced.
#[derive(Debug, Clone)]
pub struct OptimizationSummary {
    pub clean: CleanOutcome,
    /// `(accepted, rejected)` per optimizer pass.
    pub passes: Vec<(usize, usize)>,
    pub initial_penalty: f64,
    pub final_penalty: f64,
    pub final_stage: StageDir,
}

/// Cleans the hard-phase result in `hard_stage`, re-batches the clean
/// courses and runs the optimizer `max_iterations` times, each pass in its
/// own stage, followed by a final soft validation.
pub async fn run_optimization_phase<P>(
    config: &PipelineConfig,
    proposer: &P,
    validator: &ScheduleValidator,
    hard_stage: &Path,
    run_dir: &Path,
    logger: &RunLogger,
) -> Result<OptimizationSummary>
where
    P: AssignmentProposer + ?Sized,
{
    let settings = &config.optimizer;
    logger.milestone("--- Soft Optimization Phase ---");
    let clean = clean_and_analyze(hard_stage)?;
    if clean.unsolved_count > 0 {
        logger.warning(&format!(
            "{} unsolved courses are left out of optimization",
            clean.unsolved_count
        ));
    }

    let rebatched = StageDir::create(run_dir, "rebatched_for_optimizer", "initial")?;
    let mut schedule = read_schedule(&clean.clean_path)?;
    write_rebatched(&rebatched, &schedule, config.batching.batch_size)?;
    let initial = run_soft_validation(validator, &rebatched, &schedule, logger)?;

    let optimizer = Optimizer::new(proposer, validator, settings.acceptance, logger);
    let mut passes = Vec::with_capacity(settings.max_iterations);
    let mut stage = rebatched;

    for pass in 1..=settings.max_iterations {
        let next = StageDir::create(run_dir, "optimizer", &format!("iter{}", pass))?;
        let outcome = optimizer.run(schedule).await;
        outcome.persist(&next)?;
        logger.info(&format!(
            "Optimizer pass {}: {} accepted, {} rejected",
            pass,
            outcome.accepted(),
            outcome.rejected()
        ));
        passes.push((outcome.accepted(), outcome.rejected()));
        schedule = outcome.schedule;
        stage = next;
    }

    let last = run_soft_validation(validator, &stage, &schedule, logger)?;
    Ok(OptimizationSummary {
        clean,
        passes,
        initial_penalty: initial.total_weighted_penalty,
        final_penalty: last.total_weighted_penalty,
        final_stage: stage,
    })
}
