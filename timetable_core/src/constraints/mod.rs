//! Hard and soft constraint evaluation.
//!
//! - [`index`]: per-pass multi-map indices keyed by slot and `(entity, slot)`
//! - [`hard`]: the hard rules and the [`HardViolations`] collector
//! - [`soft`]: instructor gap and room usage penalties
//! - [`validator`]: the [`ScheduleValidator`] facade used by every stage

pub mod hard;
pub mod index;
pub mod soft;
pub mod validator;

pub use hard::HardViolations;
pub use index::{CourseMultiMap, EntitySlot, ScheduleIndex};
pub use soft::{
    calculate_instructor_gaps, calculate_room_usage, GapDetails, SoftReport, SoftWeights,
};
pub use validator::{BatchValidation, ScheduleValidator, ValidationReport};
