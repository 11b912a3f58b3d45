//! `"day-period"` time slot value type.
//!
//! Slots travel through the schedule files as strings such as `"2-4"`. The
//! validator only ever works with the parsed [`TimeSlot`]; anything that does
//! not parse strictly is treated as an invalid slot and kept out of the
//! slot-keyed indices.

use std::fmt;
use std::str::FromStr;

/// A parsed `day-period` pair.
///
/// # Examples
///
/// ```
/// use timetable_core::models::TimeSlot;
///
/// let slot: TimeSlot = "2-4".parse().unwrap();
/// assert_eq!(slot.day, 2);
/// assert_eq!(slot.period, 4);
/// assert_eq!(slot.to_string(), "2-4");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeSlot {
    pub day: i32,
    pub period: i32,
}

/// Why a slot string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotParseError {
    #[error("time slot '{0}' has no '-' separator")]
    MissingSeparator(String),
    #[error("time slot '{0}' has a non-numeric component")]
    NonNumeric(String),
}

impl TimeSlot {
    pub fn new(day: i32, period: i32) -> Self {
        Self { day, period }
    }

    /// Parses an optional raw slot value, returning `None` for anything that
    /// is missing or malformed.
    pub fn from_raw(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|s| s.parse().ok())
    }
}

impl FromStr for TimeSlot {
    type Err = SlotParseError;

    /// Strict parser: both halves around the first `-` must be integers
    /// (surrounding whitespace is ignored). Nothing is ever partially parsed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clean = s.trim();
        let (day, period) = clean
            .split_once('-')
            .ok_or_else(|| SlotParseError::MissingSeparator(clean.to_string()))?;

        let day = day
            .trim()
            .parse::<i32>()
            .map_err(|_| SlotParseError::NonNumeric(clean.to_string()))?;
        let period = period
            .trim()
            .parse::<i32>()
            .map_err(|_| SlotParseError::NonNumeric(clean.to_string()))?;

        Ok(TimeSlot { day, period })
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.day, self.period)
    }
}

/// Splits a raw slot into `(day, period)`, yielding `(None, None)` whenever
/// the value is absent or does not parse.
///
/// ```
/// use timetable_core::models::parse_slot;
///
/// assert_eq!(parse_slot(Some("2-4")), (Some(2), Some(4)));
/// assert_eq!(parse_slot(Some("abc")), (None, None));
/// assert_eq!(parse_slot(None), (None, None));
/// ```
pub fn parse_slot(raw: Option<&str>) -> (Option<i32>, Option<i32>) {
    match TimeSlot::from_raw(raw) {
        Some(slot) => (Some(slot.day), Some(slot.period)),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_valid_slot() {
        assert_eq!(parse_slot(Some("2-4")), (Some(2), Some(4)));
        assert_eq!(parse_slot(Some(" 1 - 3 ")), (Some(1), Some(3)));
    }

    #[test]
    fn test_parse_invalid_slots() {
        assert_eq!(parse_slot(Some("abc")), (None, None));
        assert_eq!(parse_slot(Some("2")), (None, None));
        assert_eq!(parse_slot(Some("2-")), (None, None));
        assert_eq!(parse_slot(Some("-4")), (None, None));
        assert_eq!(parse_slot(Some("1-2-3")), (None, None));
        assert_eq!(parse_slot(Some("<>")), (None, None));
        assert_eq!(parse_slot(None), (None, None));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            "abc".parse::<TimeSlot>(),
            Err(SlotParseError::MissingSeparator("abc".to_string()))
        );
        assert_eq!(
            "a-b".parse::<TimeSlot>(),
            Err(SlotParseError::NonNumeric("a-b".to_string()))
        );
    }

    #[test]
    fn test_ordering_is_day_then_period() {
        let mut slots = vec![TimeSlot::new(2, 1), TimeSlot::new(1, 4), TimeSlot::new(1, 2)];
        slots.sort();
        assert_eq!(
            slots,
            vec![TimeSlot::new(1, 2), TimeSlot::new(1, 4), TimeSlot::new(2, 1)]
        );
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(day in 0i32..10_000, period in 0i32..10_000) {
            let slot = TimeSlot::new(day, period);
            prop_assert_eq!(slot.to_string().parse::<TimeSlot>(), Ok(slot));
        }

        #[test]
        fn prop_strings_without_separator_are_invalid(s in "[a-zA-Z0-9 ]{0,12}") {
            prop_assert_eq!(parse_slot(Some(&s)), (None, None));
        }
    }
}
