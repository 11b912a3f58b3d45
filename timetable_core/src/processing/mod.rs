//! Batch bookkeeping between validation passes.
//!
//! - [`batcher`]: initial batches and re-batching of cleaned schedules
//! - [`merger`]: pairwise (smart-tail) reduction between levels
//! - [`cleaner`]: clean / unsolved split of a validated schedule

pub mod batcher;
pub mod cleaner;
pub mod merger;

pub use batcher::{
    prepare_initial_batches, read_initial_batches, rebatch_schedule, write_initial_batches,
    write_rebatched, InitialBatch,
};
pub use cleaner::{clean_and_analyze, find_consolidated, split_clean, CleanOutcome};
pub use merger::{merge_batches, merge_directory, persist_merge, plan_merge, MergeResult};
