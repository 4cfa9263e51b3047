//! Time-of-day values and the study room slot grid

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// First bookable hour of the study room grid
pub const OPENING_HOUR: u32 = 9;
/// Hour at which the last slot ends
pub const CLOSING_HOUR: u32 = 21;

/// A wall-clock time, always rendered as fixed-width 24-hour `HH:MM`.
///
/// Parsing only accepts that exact shape, so lexical order of the wire form
/// and temporal order of the value coincide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn opening() -> Self {
        Self(NaiveTime::from_hms_opt(OPENING_HOUR, 0, 0).unwrap_or(NaiveTime::MIN))
    }

    pub fn closing() -> Self {
        Self(NaiveTime::from_hms_opt(CLOSING_HOUR, 0, 0).unwrap_or(NaiveTime::MIN))
    }
}

impl FromStr for TimeOfDay {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::Validation(format!("Invalid time '{}' (use HH:MM)", s));
        let bytes = s.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(invalid());
        }
        if !bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 2 || b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let hour: u32 = s[0..2].parse().map_err(|_| invalid())?;
        let minute: u32 = s[3..5].parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Self::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Half-open `[start, end)` interval within one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    #[schema(value_type = String, example = "09:00")]
    pub start_time: TimeOfDay,
    #[schema(value_type = String, example = "10:00")]
    pub end_time: TimeOfDay,
}

impl TimeRange {
    pub fn new(start_time: TimeOfDay, end_time: TimeOfDay) -> Result<Self, AppError> {
        if start_time >= end_time {
            return Err(AppError::Validation(format!(
                "Start time {} must be before end time {}",
                start_time, end_time
            )));
        }
        Ok(Self { start_time, end_time })
    }

    /// Build a range that must also lie inside the 09:00-21:00 booking window
    pub fn within_grid(start_time: TimeOfDay, end_time: TimeOfDay) -> Result<Self, AppError> {
        let range = Self::new(start_time, end_time)?;
        if range.start_time < TimeOfDay::opening() || range.end_time > TimeOfDay::closing() {
            return Err(AppError::Validation(format!(
                "Bookings must lie between {} and {}",
                TimeOfDay::opening(),
                TimeOfDay::closing()
            )));
        }
        Ok(range)
    }

    /// `[s1,e1)` and `[s2,e2)` overlap iff `!(e1 <= s2 || s1 >= e2)`.
    ///
    /// For non-empty ranges this matches the three booking conflict cases:
    /// the new start falls inside an existing range, the new end falls inside
    /// it, or the new range contains it.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        !(self.end_time <= other.start_time || self.start_time >= other.end_time)
    }
}

/// The twelve one-hour slots from 09:00 to 21:00
pub fn hourly_slots() -> Vec<TimeRange> {
    (OPENING_HOUR..CLOSING_HOUR)
        .filter_map(|hour| {
            let start = TimeOfDay::from_hm(hour, 0)?;
            let end = TimeOfDay::from_hm(hour + 1, 0)?;
            Some(TimeRange { start_time: start, end_time: end })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn range(a: &str, b: &str) -> TimeRange {
        TimeRange::new(t(a), t(b)).unwrap()
    }

    #[test]
    fn test_parse_fixed_width() {
        assert_eq!(t("09:00").to_string(), "09:00");
        assert_eq!(t("20:45").hour(), 20);
        assert_eq!(t("20:45").minute(), 45);
        for bad in ["9:00", "09:0", "0900", "24:00", "09:60", "ab:cd", "09:00:00", ""] {
            assert!(bad.parse::<TimeOfDay>().is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_lexical_order_matches_time_order() {
        let mut values = vec!["13:00", "09:30", "20:59", "09:05", "10:00"];
        let mut parsed: Vec<TimeOfDay> = values.iter().map(|s| t(s)).collect();
        values.sort();
        parsed.sort();
        let rendered: Vec<String> = parsed.iter().map(|v| v.to_string()).collect();
        assert_eq!(rendered, values);
    }

    #[test]
    fn test_grid_has_twelve_slots() {
        let slots = hourly_slots();
        assert_eq!(slots.len(), 12);
        assert_eq!(slots[0], range("09:00", "10:00"));
        assert_eq!(slots[11], range("20:00", "21:00"));
    }

    #[test]
    fn test_overlap_cases() {
        let existing = range("10:00", "11:00");
        // new start inside existing
        assert!(range("10:30", "11:30").overlaps(&existing));
        // new end inside existing
        assert!(range("09:30", "10:30").overlaps(&existing));
        // new range contains existing
        assert!(range("09:00", "12:00").overlaps(&existing));
        // identical
        assert!(range("10:00", "11:00").overlaps(&existing));
        // adjacent ranges do not overlap
        assert!(!range("11:00", "12:00").overlaps(&existing));
        assert!(!range("09:00", "10:00").overlaps(&existing));
    }

    #[test]
    fn test_range_validation() {
        assert!(TimeRange::new(t("10:00"), t("10:00")).is_err());
        assert!(TimeRange::new(t("11:00"), t("10:00")).is_err());
        assert!(TimeRange::within_grid(t("08:00"), t("10:00")).is_err());
        assert!(TimeRange::within_grid(t("20:00"), t("21:30")).is_err());
        assert!(TimeRange::within_grid(t("09:00"), t("21:00")).is_ok());
    }

    #[test]
    fn test_serde_round_trip_shape() {
        let json = serde_json::to_string(&t("07:05")).unwrap();
        assert_eq!(json, "\"07:05\"");
        assert!(serde_json::from_str::<TimeOfDay>("\"7:05\"").is_err());
    }
}
