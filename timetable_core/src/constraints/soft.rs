//! Soft-constraint penalties. Lower is better; nothing here fails a schedule.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::index::entity_id;
use crate::models::Course;

/// Per-instructor, per-day idle gap totals. Days without a gap are absent.
pub type GapDetails = BTreeMap<String, BTreeMap<i32, u32>>;

/// Multipliers applied to each raw penalty before summing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoftWeights {
    #[serde(default = "default_weight")]
    pub gap: f64,
    #[serde(default = "default_weight")]
    pub room: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Default for SoftWeights {
    fn default() -> Self {
        Self {
            gap: default_weight(),
            room: default_weight(),
        }
    }
}

/// Sums the idle periods between consecutive occupied periods of every
/// instructor on every day.
///
/// Input courses that are not placed, have no instructor, or carry a
/// malformed slot are ignored. A day with a single period contributes 0.
///
/// # Examples
///
/// ```
/// use timetable_core::constraints::calculate_instructor_gaps;
/// use timetable_core::models::Course;
///
/// let schedule = vec![
///     Course::new("A-1-0", 10).with_instructor("I1").placed("3-1", "R1"),
///     Course::new("B-1-0", 10).with_instructor("I1").placed("3-2", "R1"),
///     Course::new("C-1-0", 10).with_instructor("I1").placed("3-4", "R1"),
/// ];
/// let (penalty, details) = calculate_instructor_gaps(&schedule);
/// assert_eq!(penalty, 1);
/// assert_eq!(details["I1"][&3], 1);
/// ```
pub fn calculate_instructor_gaps(schedule: &[Course]) -> (u32, GapDetails) {
    let mut periods: BTreeMap<&str, BTreeMap<i32, Vec<i32>>> = BTreeMap::new();
    for course in schedule.iter().filter(|c| c.is_placed()) {
        let (Some(instructor), Some(slot)) =
            (entity_id(course.assigned_instructor.as_deref()), course.slot())
        else {
            continue;
        };
        periods
            .entry(instructor)
            .or_default()
            .entry(slot.day)
            .or_default()
            .push(slot.period);
    }

    let mut total: u32 = 0;
    let mut details = GapDetails::new();
    for (instructor, days) in periods {
        for (day, mut day_periods) in days {
            if day_periods.len() <= 1 {
                continue;
            }
            day_periods.sort_unstable();

            let gaps = day_periods
                .windows(2)
                .map(|pair| period_gap(pair[0], pair[1]))
                .fold(0u32, u32::saturating_add);
            if gaps > 0 {
                details
                    .entry(instructor.to_string())
                    .or_default()
                    .insert(day, gaps);
                total = total.saturating_add(gaps);
            }
        }
    }

    (total, details)
}

/// Empty periods strictly between `earlier` and `later`. Any integer
/// period is a valid slot, so the difference is taken in `i64`.
fn period_gap(earlier: i32, later: i32) -> u32 {
    let gap = i64::from(later) - i64::from(earlier) - 1;
    gap.clamp(0, i64::from(u32::MAX)) as u32
}

/// Distinct rooms used by placed courses, sorted by `(length, text)`.
pub fn calculate_room_usage(schedule: &[Course]) -> (u32, Vec<String>) {
    let used: BTreeSet<&str> = schedule
        .iter()
        .filter(|c| c.is_placed())
        .filter_map(|c| entity_id(c.room_id.as_deref()))
        .collect();

    let mut rooms: Vec<String> = used.into_iter().map(str::to_string).collect();
    rooms.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    (rooms.len() as u32, rooms)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapPenalty {
    pub raw: u32,
    pub weighted: f64,
    pub details: GapDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomPenalty {
    pub raw: u32,
    pub weighted: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftPenalties {
    pub instructor_gaps: GapPenalty,
    pub room_usage: RoomPenalty,
}

/// Soft evaluation of one schedule, in the persisted report shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftReport {
    pub total_weighted_penalty: f64,
    pub penalties: SoftPenalties,
}

impl SoftReport {
    pub fn evaluate(schedule: &[Course], weights: SoftWeights) -> Self {
        let (gap_raw, gap_details) = calculate_instructor_gaps(schedule);
        let (room_raw, _) = calculate_room_usage(schedule);

        let gap_weighted = f64::from(gap_raw) * weights.gap;
        let room_weighted = f64::from(room_raw) * weights.room;

        Self {
            total_weighted_penalty: gap_weighted + room_weighted,
            penalties: SoftPenalties {
                instructor_gaps: GapPenalty {
                    raw: gap_raw,
                    weighted: gap_weighted,
                    details: gap_details,
                },
                room_usage: RoomPenalty {
                    raw: room_raw,
                    weighted: room_weighted,
                },
            },
        }
    }

    pub fn gap_details(&self) -> &GapDetails {
        &self.penalties.instructor_gaps.details
    }
}
