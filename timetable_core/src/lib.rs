//! # Timetable Core
//!
//! Constraint-driven course timetabling engine.
//!
//! The crate validates course schedules against hard and soft constraints
//! and drives a hierarchical repair loop in which an external assignment
//! proposer places courses and this crate decides what to keep.
//!
//! ## Features
//!
//! - **Validation**: eight hard rules (conflicts, capacity, room type,
//!   availability, daily load, intra-semester overlap) and two soft
//!   penalties (instructor gaps, room usage)
//! - **Batching**: enrolment-ordered initial batches and re-batching
//! - **Merging**: level-to-level batch reduction that never leaves a
//!   singleton tail
//! - **Repair**: a level loop with a bounded fixer budget per level
//! - **Optimization**: feasibility-preserving local search on soft penalties
//!
//! ## Architecture
//!
//! - [`models`]: courses, reference records, time slots, batches
//! - [`constraints`]: hard and soft evaluation, [`constraints::ScheduleValidator`]
//! - [`processing`]: batcher, merger, cleaner
//! - [`proposer`]: the [`proposer::AssignmentProposer`] boundary and its implementations
//! - [`repair`]: generation, fixer and the repair controller
//! - [`optimizer`]: soft-constraint accept/rollback loop
//! - [`io`]: JSON files, stage directory layout, persisted reports
//! - [`pipeline`]: end-to-end stage runner
//! - [`config`], [`logging`], [`error`]: ambient plumbing

pub mod config;
pub mod constraints;
pub mod error;
pub mod io;
pub mod logging;
pub mod models;
pub mod optimizer;
pub mod pipeline;
pub mod processing;
pub mod proposer;
pub mod repair;

pub use config::PipelineConfig;
pub use constraints::ScheduleValidator;
pub use error::{PipelineError, PipelineResult};
