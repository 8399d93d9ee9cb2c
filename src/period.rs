//! # Period Module
//!
//! Resolves the reporting window for a run. All boundaries are timezone-naive;
//! the caller supplies "now" so resolution stays a pure function.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::PeriodError;

/// How the reporting window is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeStrategy {
    /// First of the current month up to now
    MonthToDate,
    /// A whole calendar month
    FullMonth { year: i32, month: u32 },
    /// Day 1 through `end_day` of a calendar month
    PartialMonth { year: i32, month: u32, end_day: u32 },
    /// The calendar month before the one containing now
    LastMonth,
}

impl RangeStrategy {
    pub fn kind(&self) -> &'static str {
        match self {
            RangeStrategy::MonthToDate => "month_to_date",
            RangeStrategy::FullMonth { .. } => "full_month",
            RangeStrategy::PartialMonth { .. } => "partial_month",
            RangeStrategy::LastMonth => "last_month",
        }
    }
}

/// A resolved reporting window, inclusive at both ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPeriod {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub year: i32,
    pub month: u32,
    /// Human label, e.g. `2024-07`, `2024-07 (to date)`, `2024-07 (days 1-15)`
    pub label: String,
    pub strategy: RangeStrategy,
}

/// Number of days in the given month, or `None` when the month is invalid
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from((next - first).num_days()).ok()
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    // 23:59:59 is always a valid wall-clock time
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, PeriodError> {
    if !(1..=12).contains(&month) {
        return Err(PeriodError::InvalidMonth(month));
    }
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(PeriodError::InvalidYear(year))
}

fn month_bounds(year: i32, month: u32, end_day: u32) -> Result<(NaiveDateTime, NaiveDateTime), PeriodError> {
    let first = first_of_month(year, month)?;
    let max = days_in_month(year, month).ok_or(PeriodError::InvalidYear(year))?;
    if end_day == 0 || end_day > max {
        return Err(PeriodError::InvalidDay {
            year,
            month,
            day: end_day,
            max,
        });
    }
    let last = first
        .with_day(end_day)
        .ok_or(PeriodError::InvalidDay {
            year,
            month,
            day: end_day,
            max,
        })?;
    Ok((first.and_time(NaiveTime::MIN), end_of_day(last)))
}

/// The (year, month) preceding the month of `now`; January rolls back to December
pub fn previous_month(now: NaiveDateTime) -> (i32, u32) {
    if now.month() == 1 {
        (now.year() - 1, 12)
    } else {
        (now.year(), now.month() - 1)
    }
}

impl ReportPeriod {
    pub fn resolve(strategy: RangeStrategy, now: NaiveDateTime) -> Result<Self, PeriodError> {
        match strategy {
            RangeStrategy::MonthToDate => {
                let (year, month) = (now.year(), now.month());
                let start = first_of_month(year, month)?.and_time(NaiveTime::MIN);
                Ok(ReportPeriod {
                    start,
                    end: now,
                    year,
                    month,
                    label: format!("{year}-{month:02} (to date)"),
                    strategy,
                })
            }
            RangeStrategy::FullMonth { year, month } => {
                let max = days_in_month(year, month).ok_or(if (1..=12).contains(&month) {
                    PeriodError::InvalidYear(year)
                } else {
                    PeriodError::InvalidMonth(month)
                })?;
                let (start, end) = month_bounds(year, month, max)?;
                Ok(ReportPeriod {
                    start,
                    end,
                    year,
                    month,
                    label: format!("{year}-{month:02}"),
                    strategy,
                })
            }
            RangeStrategy::PartialMonth {
                year,
                month,
                end_day,
            } => {
                let (start, end) = month_bounds(year, month, end_day)?;
                Ok(ReportPeriod {
                    start,
                    end,
                    year,
                    month,
                    label: format!("{year}-{month:02} (days 1-{end_day})"),
                    strategy,
                })
            }
            RangeStrategy::LastMonth => {
                let (year, month) = previous_month(now);
                let mut period = Self::resolve(RangeStrategy::FullMonth { year, month }, now)?;
                period.strategy = strategy;
                Ok(period)
            }
        }
    }

    /// Filename-safe tag; whole months use `YYYY_MM`, other windows embed both dates
    pub fn filename_tag(&self) -> String {
        match self.strategy {
            RangeStrategy::FullMonth { .. } | RangeStrategy::LastMonth => {
                format!("{}_{:02}", self.year, self.month)
            }
            _ => format!(
                "{}_{}",
                self.start.format("%Y_%m_%d"),
                self.end.format("%Y_%m_%d")
            ),
        }
    }

    /// Whole days between start and end, as the data summary reports it
    pub fn date_range_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts <= self.end
    }
}
