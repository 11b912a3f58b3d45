//! End-to-end stage runner.
//!
//! ```text
//! load reference data
//!   └─ data prep → generation → level loop        (skipped when resuming)
//!        └─ cleaning → re-batching → optimizer × N  (only when optimizing)
//! ```
//!
//! Every stage writes into its own directory under `<output_dir>/<tag>/`.
//! A failing stage is logged and stops the run; artifacts of earlier stages
//! are left as they are.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::constraints::ScheduleValidator;
use crate::io::layout::StageDir;
use crate::logging::RunLogger;
use crate::models::ReferenceData;
use crate::proposer::AssignmentProposer;
use crate::repair::{RepairController, RepairOutcome};

pub mod steps;

pub use steps::{
    run_dataprep, run_optimization_phase, run_soft_validation, validate_stage, OptimizationSummary,
};

/// Per-invocation options.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    /// Name of the run; output goes to `<output_dir>/<tag>`.
    pub tag: String,
    /// Existing hard-valid stage directory to resume from.
    pub start_from: Option<PathBuf>,
    /// Run the soft optimization phase regardless of the config flag.
    pub optimize: bool,
}

impl PipelineRun {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            start_from: None,
            optimize: false,
        }
    }
}

/// What a pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub run_dir: PathBuf,
    /// `None` when the run resumed from an existing stage.
    pub repair: Option<RepairOutcome>,
    pub hard_stage: PathBuf,
    pub optimization: Option<OptimizationSummary>,
}

/// Runs the pipeline described by `config` and `run` with `proposer`.
pub async fn run_pipeline<P>(
    config: &PipelineConfig,
    proposer: &P,
    run: &PipelineRun,
) -> Result<PipelineSummary>
where
    P: AssignmentProposer + ?Sized,
{
    config.validate()?;
    let logger = RunLogger::new("pipeline", run.tag.clone(), &config.paths.log_dir);
    logger.milestone(&format!("=== Pipeline run '{}' ===", run.tag));

    let reference = match ReferenceData::load(&config.paths.data_dir) {
        Ok(reference) => Arc::new(reference),
        Err(e) => {
            logger.fatal(&format!("Cannot load reference data: {}", e));
            return Err(e).context("Loading reference data");
        }
    };
    let validator = ScheduleValidator::new(reference).with_weights(config.soft_weights);
    let run_dir = config.paths.output_dir.join(&run.tag);

    let (repair, hard_stage) = match &run.start_from {
        Some(dir) => {
            logger.milestone(&format!("Resuming from {}", dir.display()));
            let stage = StageDir::open(dir);
            if stage.consolidated_path().is_file() {
                validate_stage(&validator, &stage, &logger)?;
            }
            (None, dir.clone())
        }
        None => {
            let outcome = hard_phase(config, proposer, &validator, &run_dir, &logger)
                .await
                .map_err(|e| {
                    logger.fatal(&format!("Hard-constraint phase failed: {:#}", e));
                    e
                })?;
            let stage = outcome
                .final_stage
                .as_ref()
                .map(|s| s.root().to_path_buf())
                .unwrap_or_else(|| run_dir.clone());
            (Some(outcome), stage)
        }
    };

    let optimization = if run.optimize || config.optimizer.enabled {
        let summary = run_optimization_phase(
            config,
            proposer,
            &validator,
            &hard_stage,
            &run_dir,
            &logger,
        )
        .await
        .map_err(|e| {
            logger.fatal(&format!("Optimization phase failed: {:#}", e));
            e
        })?;
        Some(summary)
    } else {
        logger.info("Soft optimization disabled");
        None
    };

    logger.milestone(&format!("=== Pipeline run '{}' finished ===", run.tag));
    Ok(PipelineSummary {
        run_dir,
        repair,
        hard_stage,
        optimization,
    })
}

async fn hard_phase<P>(
    config: &PipelineConfig,
    proposer: &P,
    validator: &ScheduleValidator,
    run_dir: &std::path::Path,
    logger: &RunLogger,
) -> Result<RepairOutcome>
where
    P: AssignmentProposer + ?Sized,
{
    let initial = run_dataprep(config, validator.reference(), logger)?;
    let outcome = RepairController::new(proposer, validator, config.repair.clone(), logger)
        .with_output(run_dir)
        .generate_and_repair(initial)
        .await?;

    let levels: Vec<String> = outcome
        .levels
        .iter()
        .map(|l| format!("L{}: {:?}", l.level, l.violations_per_pass))
        .collect();
    logger.info(&format!("Violations per level: {}", levels.join(", ")));
    if !outcome.is_clean() {
        logger.warning(&format!(
            "{} courses still violate hard constraints",
            outcome.remaining_violations()
        ));
    }
    Ok(outcome)
}
