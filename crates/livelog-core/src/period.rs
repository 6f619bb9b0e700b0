//! Calendar periods and date expressions.
//!
//! Everything here works on site-local naive dates; conversion to UTC happens
//! in [`crate::time_range`].

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::LiveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodKind {
    Day,
    Week,
    Month,
    Year,
    Range,
}

impl PeriodKind {
    pub fn parse(raw: &str) -> Result<Self, LiveError> {
        match raw.trim() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "range" => Ok(Self::Range),
            other => Err(LiveError::InvalidPeriod(other.to_string())),
        }
    }
}

/// Inclusive span of local calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// The calendar period of `kind` that contains `date`.
    ///
    /// Weeks run Monday through Sunday. `Range` has no calendar shape of its
    /// own and degrades to the single day.
    pub fn containing(kind: PeriodKind, date: NaiveDate) -> Result<Self, LiveError> {
        let invalid = || LiveError::InvalidDate(date.to_string());
        match kind {
            PeriodKind::Day | PeriodKind::Range => Ok(Self {
                start: date,
                end: date,
            }),
            PeriodKind::Week => {
                let offset = i64::from(date.weekday().num_days_from_monday());
                let start = date - Duration::days(offset);
                Ok(Self {
                    start,
                    end: start + Duration::days(6),
                })
            }
            PeriodKind::Month => {
                let start = date.with_day(1).ok_or_else(invalid)?;
                let end = start
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .ok_or_else(invalid)?;
                Ok(Self { start, end })
            }
            PeriodKind::Year => {
                let start = NaiveDate::from_ymd_opt(date.year(), 1, 1).ok_or_else(invalid)?;
                let end = NaiveDate::from_ymd_opt(date.year(), 12, 31).ok_or_else(invalid)?;
                Ok(Self { start, end })
            }
        }
    }

    /// `count` whole periods ending with the current one (`lastN`) or with the
    /// one before it (`previousN`).
    pub fn trailing(
        kind: PeriodKind,
        count: u32,
        today: NaiveDate,
        previous: bool,
    ) -> Result<Self, LiveError> {
        let label = if previous { "previous" } else { "last" };
        let invalid = || LiveError::InvalidDate(format!("{label}{count}"));
        if count == 0 {
            return Err(invalid());
        }

        let end_offset = u32::from(previous);
        let start_offset = count - 1 + end_offset;
        let end_anchor = shift_back(kind, today, end_offset).ok_or_else(invalid)?;
        let start_anchor = shift_back(kind, today, start_offset).ok_or_else(invalid)?;
        Ok(Self {
            start: Self::containing(kind, start_anchor)?.start,
            end: Self::containing(kind, end_anchor)?.end,
        })
    }
}

fn shift_back(kind: PeriodKind, date: NaiveDate, periods: u32) -> Option<NaiveDate> {
    match kind {
        PeriodKind::Day | PeriodKind::Range => {
            date.checked_sub_signed(Duration::days(i64::from(periods)))
        }
        PeriodKind::Week => date.checked_sub_signed(Duration::days(i64::from(periods) * 7)),
        PeriodKind::Month => date.checked_sub_months(Months::new(periods)),
        PeriodKind::Year => date.checked_sub_months(Months::new(periods.checked_mul(12)?)),
    }
}

/// A single `date` parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateExpr {
    Today,
    Now,
    Yesterday,
    YesterdaySameTime,
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Last(u32),
    Previous(u32),
}

impl DateExpr {
    pub fn parse(raw: &str) -> Result<Self, LiveError> {
        let raw = raw.trim();
        let invalid = || LiveError::InvalidDate(raw.to_string());
        match raw {
            "today" => return Ok(Self::Today),
            "now" => return Ok(Self::Now),
            "yesterday" => return Ok(Self::Yesterday),
            "yesterdaySameTime" => return Ok(Self::YesterdaySameTime),
            _ => {}
        }
        if let Some(n) = raw.strip_prefix("last") {
            return n.parse().map(Self::Last).map_err(|_| invalid());
        }
        if let Some(n) = raw.strip_prefix("previous") {
            return n.parse().map(Self::Previous).map_err(|_| invalid());
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(Self::Date(date));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .map(Self::DateTime)
            .map_err(|_| invalid())
    }

    /// The local instant this expression names, relative to `now_local`.
    ///
    /// `None` for the trailing-window forms, which name a span, not a point.
    pub fn resolve(&self, now_local: NaiveDateTime) -> Option<NaiveDateTime> {
        let today = now_local.date();
        match *self {
            Self::Today => Some(today.and_time(NaiveTime::MIN)),
            Self::Now => Some(now_local),
            Self::Yesterday => today.pred_opt().map(|d| d.and_time(NaiveTime::MIN)),
            Self::YesterdaySameTime => now_local.checked_sub_signed(Duration::days(1)),
            Self::Date(date) => Some(date.and_time(NaiveTime::MIN)),
            Self::DateTime(dt) => Some(dt),
            Self::Last(_) | Self::Previous(_) => None,
        }
    }
}

/// Parse the `date` value of a `range` period.
///
/// Accepts `YYYY-MM-DD,END` where `END` is a date, `today`, `now` or
/// `yesterday`, and the day-based trailing forms `lastN` / `previousN`.
pub fn parse_date_range(raw: &str, today: NaiveDate) -> Result<DateRange, LiveError> {
    let raw = raw.trim();
    let invalid = || LiveError::InvalidRange(raw.to_string());

    if let Some((start_raw, end_raw)) = raw.split_once(',') {
        let start =
            NaiveDate::parse_from_str(start_raw.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
        let end = match end_raw.trim() {
            "today" | "now" => today,
            "yesterday" => today.pred_opt().ok_or_else(invalid)?,
            other => NaiveDate::parse_from_str(other, "%Y-%m-%d").map_err(|_| invalid())?,
        };
        if end < start {
            return Err(invalid());
        }
        return Ok(DateRange { start, end });
    }

    match DateExpr::parse(raw) {
        Ok(DateExpr::Last(n)) => DateRange::trailing(PeriodKind::Day, n, today, false),
        Ok(DateExpr::Previous(n)) => DateRange::trailing(PeriodKind::Day, n, today, true),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    #[test]
    fn period_kind_rejects_unknown() {
        assert_eq!(PeriodKind::parse("week").expect("week"), PeriodKind::Week);
        let err = PeriodKind::parse("fortnight").expect_err("unknown");
        assert!(err.to_string().contains("fortnight"));
    }

    #[test]
    fn week_runs_monday_to_sunday() {
        let week = DateRange::containing(PeriodKind::Week, d("2024-01-10")).expect("week");
        assert_eq!(week.start, d("2024-01-08"));
        assert_eq!(week.end, d("2024-01-14"));

        let sunday = DateRange::containing(PeriodKind::Week, d("2024-01-14")).expect("week");
        assert_eq!(sunday.start, d("2024-01-08"));
    }

    #[test]
    fn month_and_year_boundaries() {
        let feb = DateRange::containing(PeriodKind::Month, d("2024-02-17")).expect("month");
        assert_eq!(feb.start, d("2024-02-01"));
        assert_eq!(feb.end, d("2024-02-29"));

        let year = DateRange::containing(PeriodKind::Year, d("2023-06-30")).expect("year");
        assert_eq!(year.start, d("2023-01-01"));
        assert_eq!(year.end, d("2023-12-31"));
    }

    #[test]
    fn trailing_windows() {
        let today = d("2024-03-15");
        let last7 = DateRange::trailing(PeriodKind::Day, 7, today, false).expect("last7");
        assert_eq!(last7.start, d("2024-03-09"));
        assert_eq!(last7.end, today);

        let prev2 = DateRange::trailing(PeriodKind::Month, 2, today, true).expect("previous2");
        assert_eq!(prev2.start, d("2024-01-01"));
        assert_eq!(prev2.end, d("2024-02-29"));

        assert!(DateRange::trailing(PeriodKind::Day, 0, today, false).is_err());
    }

    #[test]
    fn date_expressions() {
        assert_eq!(DateExpr::parse("today").expect("today"), DateExpr::Today);
        assert_eq!(
            DateExpr::parse("last30").expect("last30"),
            DateExpr::Last(30)
        );
        assert_eq!(
            DateExpr::parse("previous3").expect("previous3"),
            DateExpr::Previous(3)
        );
        assert_eq!(
            DateExpr::parse("2024-01-10").expect("date"),
            DateExpr::Date(d("2024-01-10"))
        );
        assert!(DateExpr::parse("lastweek").is_err());
        assert!(DateExpr::parse("2024-13-01").is_err());
        assert!(DateExpr::parse("tomorrow").is_err());
    }

    #[test]
    fn yesterday_same_time_keeps_the_clock() {
        let now = d("2024-03-15").and_hms_opt(14, 30, 0).expect("time");
        let resolved = DateExpr::YesterdaySameTime.resolve(now).expect("resolved");
        assert_eq!(
            resolved,
            d("2024-03-14").and_hms_opt(14, 30, 0).expect("time")
        );
    }

    #[test]
    fn literal_ranges() {
        let today = d("2024-03-15");
        let range = parse_date_range("2024-03-01,2024-03-10", today).expect("range");
        assert_eq!(range.start, d("2024-03-01"));
        assert_eq!(range.end, d("2024-03-10"));

        let open = parse_date_range("2024-03-01,today", today).expect("range");
        assert_eq!(open.end, today);

        assert!(parse_date_range("2024-03-10,2024-03-01", today).is_err());
        assert!(parse_date_range("2024-03-10", today).is_err());
    }
}
