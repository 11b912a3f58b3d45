//! Pipeline configuration file support.
//!
//! Settings are read from a TOML file in which every section is optional.
//! Environment variables can override the most frequently changed values.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constraints::SoftWeights;
use crate::error::{PipelineError, PipelineResult};

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub batching: BatchingSettings,
    #[serde(default)]
    pub repair: RepairSettings,
    #[serde(default)]
    pub optimizer: OptimizerSettings,
    #[serde(default)]
    pub soft_weights: SoftWeights,
    #[serde(default)]
    pub proposer: ProposerSettings,
}

/// Input and output locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchingSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Hard-constraint repair loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairSettings {
    /// Fixer passes per level before the level is given up on.
    #[serde(default = "default_max_fixer_iterations")]
    pub max_fixer_iterations_per_level: usize,
    /// Let conflicts between different batches hold a level open. Off by
    /// default: a level is fixed once every batch is clean on its own.
    #[serde(default)]
    pub validate_consolidated: bool,
}

/// When an optimizer move is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptancePolicy {
    /// Keep any move that leaves the schedule free of hard violations.
    #[default]
    FeasibleOnly,
    /// Additionally require a strictly lower weighted soft penalty.
    RequireImprovement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_optimizer_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub acceptance: AcceptancePolicy,
}

/// External proposer command and retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposerSettings {
    #[serde(default)]
    pub command: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("log")
}

fn default_batch_size() -> usize {
    20
}

fn default_max_fixer_iterations() -> usize {
    2
}

fn default_optimizer_iterations() -> usize {
    2
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    30
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            output_dir: default_output_dir(),
            log_dir: default_log_dir(),
        }
    }
}

impl Default for BatchingSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

impl Default for RepairSettings {
    fn default() -> Self {
        Self {
            max_fixer_iterations_per_level: default_max_fixer_iterations(),
            validate_consolidated: false,
        }
    }
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_iterations: default_optimizer_iterations(),
            acceptance: AcceptancePolicy::default(),
        }
    }
}

impl Default for ProposerSettings {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(PipelineConfig)` if successful
    /// * `Err(PipelineError::Io)` if the file cannot be read
    /// * `Err(PipelineError::Configuration)` if it cannot be parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| PipelineError::io(path.as_ref(), e))?;

        toml::from_str(&content).map_err(|e| {
            PipelineError::Configuration(format!("Failed to parse config file: {}", e))
        })
    }

    /// Load pipeline configuration from the default location.
    ///
    /// Searches for `pipeline.toml` in:
    /// 1. Current directory
    /// 2. `timetable_core/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> PipelineResult<Self> {
        let search_paths = [
            PathBuf::from("pipeline.toml"),
            PathBuf::from("timetable_core/pipeline.toml"),
            PathBuf::from("../pipeline.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(PipelineError::Configuration(
            "No pipeline.toml found in standard locations".to_string(),
        ))
    }

    /// Applies `TIMETABLE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary key lookup. Values that do not
    /// parse are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("TIMETABLE_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("TIMETABLE_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("TIMETABLE_BATCH_SIZE") {
            match raw.trim().parse() {
                Ok(size) => self.batching.batch_size = size,
                Err(_) => log::warn!("Ignoring TIMETABLE_BATCH_SIZE={:?}", raw),
            }
        }
        if let Some(raw) = lookup("TIMETABLE_MAX_FIXER_ITERATIONS") {
            match raw.trim().parse() {
                Ok(n) => self.repair.max_fixer_iterations_per_level = n,
                Err(_) => log::warn!("Ignoring TIMETABLE_MAX_FIXER_ITERATIONS={:?}", raw),
            }
        }
        if let Some(raw) = lookup("TIMETABLE_OPTIMIZE") {
            match parse_flag(&raw) {
                Some(flag) => self.optimizer.enabled = flag,
                None => log::warn!("Ignoring TIMETABLE_OPTIMIZE={:?}", raw),
            }
        }
        if let Some(command) = lookup("TIMETABLE_PROPOSER_COMMAND") {
            self.proposer.command = Some(PathBuf::from(command));
        }
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.batching.batch_size == 0 {
            return Err(PipelineError::Configuration(
                "batching.batch_size must be greater than zero".to_string(),
            ));
        }
        for (name, weight) in [("gap", self.soft_weights.gap), ("room", self.soft_weights.room)] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(PipelineError::Configuration(format!(
                    "soft_weights.{} must be a finite non-negative number, got {}",
                    name, weight
                )));
            }
        }
        Ok(())
    }
}
