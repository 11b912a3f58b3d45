//! File I/O for pipeline artifacts.
//!
//! - [`json`]: JSON read/write with path-aware deserialization errors
//! - [`layout`]: stage directories, batch file naming and ordering
//! - [`reference`]: loading of the static reference files
//! - [`reports`]: text run reports and validation report files
//!
//! # Example
//!
//! ```no_run
//! use timetable_core::io::{read_batches, StageDir};
//!
//! let stage = StageDir::open("output/run_01/fixer_L1_fix_run1");
//! let batches = read_batches(&stage.working_dir()).expect("Failed to load");
//! println!("Loaded {} batches", batches.len());
//! ```

pub mod json;
pub mod layout;
pub mod reference;
pub mod reports;

#[cfg(test)]
mod io_tests;

pub use json::{parse_json_str, read_json, read_schedule, write_json, write_schedule};
pub use layout::{
    batch_file_index, initial_batch_dirs, read_batches, reset_dir, sorted_json_files,
    write_batches, StageDir,
};
pub use reports::{
    write_soft_validation, write_validation_outputs, BatchReport, BatchStatus, ReportKind,
    RunReport,
};
