use chrono::{DateTime, Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Rendered by [`PartialDate::format`] when there is no usable year.
pub const UNKNOWN_DATE: &str = "Unknown date";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidDate {
    #[error("date has no year")]
    MissingYear,
    #[error("month {0} is out of range (1-12)")]
    MonthOutOfRange(u32),
    #[error("day {0} is out of range (1-31)")]
    DayOutOfRange(u32),
    #[error("day is set but month is missing")]
    DayWithoutMonth,
    #[error("{year:04}-{month:02}-{day:02} is not a calendar date")]
    NotACalendarDate { year: i32, month: u32, day: u32 },
}

/// A calendar date with variable precision.
///
/// Remote list services record start and completion dates as `{year, month, day}`
/// where any part may be missing. Absent parts stay absent in the stored value;
/// they only default to `1` when converted to a concrete date.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PartialDate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

impl PartialDate {
    /// Build a validated date. `day` requires `month`.
    pub fn new(year: i32, month: Option<u32>, day: Option<u32>) -> Result<Self, InvalidDate> {
        let date = Self {
            year: Some(year),
            month,
            day,
        };
        date.validate()?;
        Ok(date)
    }

    pub fn ymd(year: i32, month: u32, day: u32) -> Result<Self, InvalidDate> {
        Self::new(year, Some(month), Some(day))
    }

    pub fn from_calendar_date(date: NaiveDate) -> Self {
        Self {
            year: Some(date.year()),
            month: Some(date.month()),
            day: Some(date.day()),
        }
    }

    /// Convert a unix timestamp in milliseconds. Returns `None` when the instant is
    /// outside the representable range.
    pub fn from_timestamp_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(|dt| Self::from_calendar_date(dt.date_naive()))
    }

    /// Today's date in local time, with all three fields set.
    pub fn now() -> Self {
        Self::from_calendar_date(Local::now().date_naive())
    }

    /// Concrete date with missing month/day defaulted to 1.
    pub fn to_calendar_date(&self) -> Option<NaiveDate> {
        let year = self.year?;
        let month = self.month.unwrap_or(1);
        let day = self.day.unwrap_or(1);
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }
        // from_ymd_opt rejects Feb 30, Apr 31 and friends
        NaiveDate::from_ymd_opt(year, month, day)
    }

    pub fn validate(&self) -> Result<(), InvalidDate> {
        let year = self.year.ok_or(InvalidDate::MissingYear)?;
        if let Some(month) = self.month {
            if !(1..=12).contains(&month) {
                return Err(InvalidDate::MonthOutOfRange(month));
            }
        }
        if let Some(day) = self.day {
            if !(1..=31).contains(&day) {
                return Err(InvalidDate::DayOutOfRange(day));
            }
        }
        match (self.month, self.day) {
            (None, Some(_)) => Err(InvalidDate::DayWithoutMonth),
            (Some(month), Some(day)) if NaiveDate::from_ymd_opt(year, month, day).is_none() => {
                Err(InvalidDate::NotACalendarDate { year, month, day })
            }
            _ => Ok(()),
        }
    }

    pub fn is_valid(date: Option<&PartialDate>) -> bool {
        date.is_some_and(|d| d.validate().is_ok())
    }

    /// Loose ordering: a missing date (or one without a year) sorts first, and
    /// missing month/day compare as 1. `2024` and `2024-01` are therefore equal here
    /// even though they are not `==`.
    pub fn compare(a: Option<&PartialDate>, b: Option<&PartialDate>) -> Ordering {
        a.and_then(PartialDate::sort_key)
            .cmp(&b.and_then(PartialDate::sort_key))
    }

    fn sort_key(&self) -> Option<(i32, u32, u32)> {
        self.year
            .map(|year| (year, self.month.unwrap_or(1), self.day.unwrap_or(1)))
    }

    /// `YYYY-MM-DD`, `YYYY-MM` or `YYYY` depending on precision.
    pub fn format(date: Option<&PartialDate>) -> String {
        match date {
            Some(date) => date.to_string(),
            None => UNKNOWN_DATE.to_string(),
        }
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(year) = self.year else {
            return f.write_str(UNKNOWN_DATE);
        };
        match (self.month, self.day) {
            (Some(month), Some(day)) => write!(f, "{:04}-{:02}-{:02}", year, month, day),
            (Some(month), None) => write!(f, "{:04}-{:02}", year, month),
            _ => write!(f, "{:04}", year),
        }
    }
}

impl From<NaiveDate> for PartialDate {
    fn from(date: NaiveDate) -> Self {
        Self::from_calendar_date(date)
    }
}
