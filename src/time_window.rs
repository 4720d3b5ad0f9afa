use std::fmt::Display;

use chrono::{Datelike as _, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Deserialize;
use thiserror::Error;

const TIMESPAN_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScanType {
    Monthly,
    Weekly,
    Daily,
}
impl ScanType {
    /// Anything that is not `Monthly` or `Weekly` is a daily scan.
    pub fn parse(s: &str) -> Self {
        match s {
            "Monthly" => ScanType::Monthly,
            "Weekly" => ScanType::Weekly,
            _ => ScanType::Daily,
        }
    }
}
impl Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ScanType::Monthly => write!(f, "Monthly"),
            ScanType::Weekly => write!(f, "Weekly"),
            ScanType::Daily => write!(f, "Daily"),
        }
    }
}

/// Which December a monthly scan run in January reports on.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JanuaryRollover {
    /// December of the previous year, i.e. the actual previous month.
    #[default]
    PreviousYear,
    /// December of the current year. The resulting window starts after it
    /// ends; kept for parity with reports produced by the older tooling.
    SameYear,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanWindowError {
    #[error("cannot compute a scan window for {0}")]
    OutOfRange(NaiveDate),
}

/// The half-open interval `[start, end)` that metrics are collected over.
/// Both ends are UTC.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn resolve(
        scan_type: ScanType,
        now: NaiveDateTime,
        rollover: JanuaryRollover,
    ) -> Result<Self, ScanWindowError> {
        let today = now.date();
        let midnight = NaiveDateTime::new(today, NaiveTime::MIN);
        let out_of_range = || ScanWindowError::OutOfRange(today);

        let window = match scan_type {
            ScanType::Monthly => {
                let (year, month) = match (today.month(), rollover) {
                    (1, JanuaryRollover::PreviousYear) => (today.year() - 1, 12),
                    (1, JanuaryRollover::SameYear) => (today.year(), 12),
                    (month, _) => (today.year(), month - 1),
                };
                let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(out_of_range)?;
                let end = today.with_day(1).ok_or_else(out_of_range)?;
                TimeWindow {
                    start: NaiveDateTime::new(start, NaiveTime::MIN),
                    end: NaiveDateTime::new(end, NaiveTime::MIN),
                }
            }
            ScanType::Weekly => TimeWindow { start: midnight - TimeDelta::days(7), end: midnight },
            ScanType::Daily => TimeWindow { start: midnight - TimeDelta::days(1), end: midnight },
        };
        Ok(window)
    }

    /// The window in the ISO 8601 interval form the metrics API accepts.
    pub fn timespan(&self) -> String {
        format!("{}Z/{}Z", self.start.format(TIMESPAN_FORMAT), self.end.format(TIMESPAN_FORMAT))
    }
}

/// The run date as used in report file names.
pub fn date_label(now: NaiveDateTime) -> String {
    now.format("%Y-%m-%d").to_string()
}
