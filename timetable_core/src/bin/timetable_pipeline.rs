//! Timetable pipeline binary.
//!
//! Runs data prep, generation, the hard-constraint repair loop and,
//! optionally, soft optimization for one named run.
//!
//! # Usage
//!
//! ```bash
//! # Full run, output under output/run_01/
//! cargo run --bin timetable-pipeline -- run_01
//!
//! # Resume from an existing hard-valid stage and optimize it
//! cargo run --bin timetable-pipeline -- run_02 --start-from output/run_01/merger_L2_merge_to_L3 --optimize
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log level (default: info)
//! - `TIMETABLE_DATA_DIR`, `TIMETABLE_OUTPUT_DIR`, `TIMETABLE_BATCH_SIZE`,
//!   `TIMETABLE_MAX_FIXER_ITERATIONS`, `TIMETABLE_OPTIMIZE`,
//!   `TIMETABLE_PROPOSER_COMMAND`: override the matching config values

use anyhow::Result;
use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use timetable_core::config::PipelineConfig;
use timetable_core::error::PipelineError;
use timetable_core::pipeline::{run_pipeline, PipelineRun};
use timetable_core::proposer::{AssignmentProposer, CommandProposer, RetryingProposer, ScriptedProposer};

#[derive(Parser, Debug)]
#[command(
    name = "timetable-pipeline",
    about = "Generate, repair and optimize a course timetable",
    version
)]
struct Cli {
    /// Run tag; output goes to `<output_dir>/<tag>/`
    tag: String,

    /// Skip the hard phase and start from an existing hard-valid stage
    #[arg(long, alias = "start_from", value_name = "DIR")]
    start_from: Option<PathBuf>,

    /// Run the soft-constraint optimizer after the hard phase
    #[arg(long)]
    optimize: bool,

    /// Config file (default: pipeline.toml in the working directory or above)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    fn run(&self) -> PipelineRun {
        PipelineRun {
            tag: self.tag.clone(),
            start_from: self.start_from.clone(),
            optimize: self.optimize,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => match PipelineConfig::from_default_location() {
            Ok(config) => config,
            Err(PipelineError::Configuration(msg)) if msg.starts_with("No pipeline.toml") => {
                info!("No pipeline.toml found, using defaults");
                PipelineConfig::default()
            }
            Err(e) => return Err(e.into()),
        },
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn build_proposer(config: &PipelineConfig) -> Box<dyn AssignmentProposer> {
    match &config.proposer.command {
        Some(command) => {
            info!("Using proposer command {}", command.display());
            Box::new(RetryingProposer::new(
                CommandProposer::new(command.clone(), config.proposer.args.clone()),
                config.proposer.max_retries,
                Duration::from_secs(config.proposer.retry_delay_seconds),
            ))
        }
        None => {
            warn!("No proposer command configured; every proposal will come back empty");
            Box::new(ScriptedProposer::new())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let proposer = build_proposer(&config);

    let run = cli.run();
    info!("Starting pipeline run '{}'", run.tag);
    let summary = run_pipeline(&config, proposer.as_ref(), &run).await?;

    if let Some(repair) = &summary.repair {
        info!(
            "Hard phase: {} levels, {} courses, {} still violating",
            repair.levels.len(),
            repair.schedule().len(),
            repair.remaining_violations()
        );
    }
    info!("Hard-valid stage: {}", summary.hard_stage.display());
    if let Some(opt) = &summary.optimization {
        info!(
            "Soft phase: penalty {:.2} -> {:.2}, {} unsolved courses excluded",
            opt.initial_penalty, opt.final_penalty, opt.clean.unsolved_count
        );
        info!("Final stage: {}", opt.final_stage.root().display());
    }

    Ok(())
}
