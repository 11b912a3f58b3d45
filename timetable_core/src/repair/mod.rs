//! Hard-constraint phase.
//!
//! - [`generator`]: first placement of the initial batches
//! - [`fixer`]: one repair pass over annotated batches
//! - [`controller`]: the level loop tying validation, fixing and merging together

pub mod controller;
pub mod fixer;
pub mod generator;

pub use controller::{LevelReport, RepairController, RepairOutcome, RepairState, CONSOLIDATED_STEM};
pub use fixer::{run_fixer, FixOutcome};
pub use generator::{run_generator, GenerateOutcome};
