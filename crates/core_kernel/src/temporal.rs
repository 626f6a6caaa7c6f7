//! Fiscal calendar types
//!
//! This module provides the calendar arithmetic billing relies on:
//! - Fiscal Year: twelve months starting at the organization's configured month
//! - Period: a half-open `[begin, end)` date range inside a fiscal year

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Timezone wrapper for the organization's local calendar
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Returns the local calendar date of a UTC instant
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        utc.with_timezone(&self.0).date_naive()
    }

    /// Today's date in this timezone
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::Europe::Zurich)
    }
}

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid period: begin {begin} must be before end {end}")]
    InvalidPeriod {
        begin: String,
        end: String,
    },

    #[error("Invalid fiscal year start month: {0}")]
    InvalidStartMonth(u32),

    #[error("Date out of supported range")]
    OutOfRange,
}

/// Adds calendar months to a date, failing instead of panicking at the range limits
pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate, TemporalError> {
    date.checked_add_months(Months::new(months))
        .ok_or(TemporalError::OutOfRange)
}

/// Returns the Monday on or after the given date
pub fn monday_on_or_after(date: NaiveDate) -> NaiveDate {
    let offset = (7 - date.weekday().num_days_from_monday()) % 7;
    date + chrono::Duration::days(offset as i64)
}

/// A fiscal year, named after the calendar year in which it begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FiscalYear {
    /// Calendar year of the first day
    pub year: i32,
    /// First month (1-12)
    pub start_month: u32,
}

impl FiscalYear {
    /// Creates a fiscal year, validating the start month
    pub fn new(year: i32, start_month: u32) -> Result<Self, TemporalError> {
        if !(1..=12).contains(&start_month) {
            return Err(TemporalError::InvalidStartMonth(start_month));
        }
        Ok(Self { year, start_month })
    }

    /// Returns the fiscal year containing the given date
    pub fn for_date(date: NaiveDate, start_month: u32) -> Result<Self, TemporalError> {
        let year = if date.month() >= start_month {
            date.year()
        } else {
            date.year() - 1
        };
        Self::new(year, start_month)
    }

    /// First day of the fiscal year
    pub fn beginning(&self) -> Result<NaiveDate, TemporalError> {
        NaiveDate::from_ymd_opt(self.year, self.start_month, 1)
            .ok_or(TemporalError::OutOfRange)
    }

    /// First day of the next fiscal year (exclusive end)
    pub fn end(&self) -> Result<NaiveDate, TemporalError> {
        add_months(self.beginning()?, 12)
    }

    /// The following fiscal year
    pub fn next(&self) -> Self {
        Self {
            year: self.year + 1,
            start_month: self.start_month,
        }
    }

    /// Returns true if the date falls in this fiscal year
    pub fn contains(&self, date: NaiveDate) -> bool {
        match (self.beginning(), self.end()) {
            (Ok(begin), Ok(end)) => date >= begin && date < end,
            _ => false,
        }
    }

    /// 1-based month index of the date relative to the fiscal year start.
    ///
    /// Dates before the fiscal year give values below 1, dates after give
    /// values above 12.
    pub fn month_index(&self, date: NaiveDate) -> i32 {
        (date.year() - self.year) * 12 + date.month() as i32 - self.start_month as i32 + 1
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_month == 1 {
            write!(f, "{}", self.year)
        } else {
            write!(f, "{}-{}", self.year, (self.year + 1) % 100)
        }
    }
}

/// A half-open date range `[begin, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    /// First day (inclusive)
    pub begin: NaiveDate,
    /// First day after the period (exclusive)
    pub end: NaiveDate,
}

impl Period {
    /// Creates a new period
    pub fn new(begin: NaiveDate, end: NaiveDate) -> Result<Self, TemporalError> {
        if begin >= end {
            return Err(TemporalError::InvalidPeriod {
                begin: begin.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { begin, end })
    }

    /// Returns true if this period contains the given date
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.begin && date < self.end
    }

    /// Returns true if the period shares at least one day with the inclusive range
    pub fn overlaps_days(&self, first: NaiveDate, last: NaiveDate) -> bool {
        self.begin <= last && first < self.end
    }

    /// Last day inside the period
    pub fn last_day(&self) -> NaiveDate {
        self.end.pred_opt().unwrap_or(self.begin)
    }

    /// Number of days covered
    pub fn days(&self) -> i64 {
        (self.end - self.begin).num_days()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

/// Month key used by projections ("YYYY-MM")
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}
