//! Domain types for course timetabling.
//!
//! - [`Course`]: one section with its current placement and annotations
//! - [`Instructor`], [`Room`], [`Curriculum`]: static reference records
//! - [`ReferenceData`]: id-indexed view over the reference records
//! - [`TimeSlot`]: parsed `day-period` value
//! - [`Batch`]: a numbered unit of repair work

pub mod batch;
pub mod course;
pub mod reference;
pub mod time_slot;
pub mod violation;

pub use batch::{flatten_batches, Batch};
pub use course::{base_course_id, is_assigned, is_assigned_value, Course, UNASSIGNED_MARKER};
pub use reference::{
    AvailableTimes, Curriculum, CurriculumEntry, Instructor, ReferenceData, Room,
    DEFAULT_MAX_COURSES_PER_DAY,
};
pub use time_slot::{parse_slot, SlotParseError, TimeSlot};
pub use violation::ViolationKind;
