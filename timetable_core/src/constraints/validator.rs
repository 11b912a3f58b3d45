//! Schedule validation facade.
//!
//! [`ScheduleValidator`] owns a shared handle to the static reference data
//! and exposes the hard and soft evaluations. Validation never mutates its
//! input: annotated schedules are returned as fresh copies, so independent
//! batches can be validated concurrently.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::hard::{self, HardViolations};
use super::index::ScheduleIndex;
use super::soft::{SoftReport, SoftWeights};
use crate::models::{Batch, Course, ReferenceData, ViolationKind};

/// Hard validation of one batch, with its annotated copy.
#[derive(Debug, Clone)]
pub struct BatchValidation {
    pub batch: Batch,
    pub violations: HardViolations,
}

/// Persisted summary of a hard validation pass over one schedule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub source_file: String,
    pub total_entries_in_input_schedule: usize,
    pub entries_fully_scheduled_for_checks: usize,
    pub total_unique_courses_violating: usize,
    pub violations_summary_by_type: BTreeMap<ViolationKind, usize>,
    pub violations_details_per_course: BTreeMap<String, Vec<ViolationKind>>,
}

impl ValidationReport {
    pub fn new(source_file: impl Into<String>, schedule: &[Course], violations: &HardViolations) -> Self {
        Self {
            source_file: source_file.into(),
            total_entries_in_input_schedule: schedule.len(),
            entries_fully_scheduled_for_checks: schedule.iter().filter(|c| c.is_placed()).count(),
            total_unique_courses_violating: violations.violating_count(),
            violations_summary_by_type: violations.summary_by_type(),
            violations_details_per_course: violations
                .details
                .iter()
                .map(|(id, kinds)| (id.clone(), kinds.iter().cloned().collect()))
                .collect(),
        }
    }
}

/// Evaluates schedules against one set of reference data.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use timetable_core::constraints::ScheduleValidator;
/// use timetable_core::models::{Course, Curriculum, Instructor, ReferenceData};
///
/// let reference = ReferenceData::new(
///     vec![Instructor::new("I1")],
///     vec![],
///     vec![],
///     Curriculum::new(),
/// );
/// let validator = ScheduleValidator::new(Arc::new(reference));
///
/// let schedule = vec![
///     Course::new("A-1-0", 10).with_instructor("I1").placed("1-1", "R1"),
///     Course::new("B-1-0", 10).with_instructor("I1").placed("1-1", "R2"),
/// ];
/// let violations = validator.validate_hard(&schedule);
/// assert_eq!(violations.violating_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ScheduleValidator {
    reference: Arc<ReferenceData>,
    weights: SoftWeights,
}

impl ScheduleValidator {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self {
            reference,
            weights: SoftWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: SoftWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn reference(&self) -> &Arc<ReferenceData> {
        &self.reference
    }

    pub fn weights(&self) -> SoftWeights {
        self.weights
    }

    /// Runs every hard check and unions the results.
    pub fn validate_hard(&self, schedule: &[Course]) -> HardViolations {
        let index = ScheduleIndex::build(schedule);
        let reference = self.reference.as_ref();
        let mut out = HardViolations::default();

        let counts = [
            hard::check_instructor_conflict(&index, &mut out),
            hard::check_room_conflict(&index, &mut out),
            hard::check_room_capacity(&index, reference, &mut out),
            hard::check_room_type(&index, reference, &mut out),
            hard::check_instructor_availability(&index, reference, &mut out),
            hard::check_room_availability(&index, reference, &mut out),
            hard::check_instructor_daily_load(&index, reference, &mut out),
            hard::check_intra_semester(&index, reference, &mut out),
            hard::check_unresolved_placements(schedule, &mut out),
        ];
        log::debug!(
            "Hard validation over {} entries ({} placed): {:?} instances, {} violating courses",
            schedule.len(),
            index.placed.len(),
            counts,
            out.violating_count()
        );

        out
    }

    pub fn validate_soft(&self, schedule: &[Course]) -> SoftReport {
        SoftReport::evaluate(schedule, self.weights)
    }

    /// Returns a copy of `schedule` whose `hard_violation_types` reflect
    /// exactly `violations`. Prior annotations are replaced, never merged;
    /// an unplaced course only keeps them because `validate_hard` reports
    /// them again.
    pub fn annotate(&self, schedule: &[Course], violations: &HardViolations) -> Vec<Course> {
        schedule
            .iter()
            .map(|course| {
                let mut copy = course.clone();
                copy.hard_violation_types = violations
                    .kinds_for(&course.course_id)
                    .cloned()
                    .unwrap_or_default();
                copy
            })
            .collect()
    }

    /// Validates and annotates in one step.
    pub fn validate_and_annotate(&self, schedule: &[Course]) -> (Vec<Course>, HardViolations) {
        let violations = self.validate_hard(schedule);
        (self.annotate(schedule, &violations), violations)
    }

    /// Validates every batch independently, in parallel. Returns once all
    /// batches are done, in the input order.
    pub fn validate_batches(&self, batches: &[Batch]) -> Vec<BatchValidation> {
        batches
            .par_iter()
            .map(|batch| {
                let (courses, violations) = self.validate_and_annotate(&batch.courses);
                BatchValidation {
                    batch: Batch::new(batch.index, courses),
                    violations,
                }
            })
            .collect()
    }
}
