//! Resolve a `(period, date)` pair into UTC bounds on `visit_last_action_time`.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::LiveError;
use crate::period::{parse_date_range, DateExpr, DateRange, PeriodKind};

/// Format of every timestamp stored in and compared against the log tables.
pub const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date values that name an in-progress window and therefore never get an
/// upper bound.
const OPEN_ENDED_DATES: [&str; 3] = ["now", "today", "yesterdaySameTime"];

/// UTC bounds for a live visit listing. `end` is `None` for open-ended windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
}

impl TimeRange {
    pub fn start_string(&self) -> String {
        self.start.format(STORAGE_FORMAT).to_string()
    }

    pub fn end_string(&self) -> Option<String> {
        self.end.map(|end| end.format(STORAGE_FORMAT).to_string())
    }
}

/// Resolve `period` and `date` in the site's timezone.
///
/// Non-range periods that land on the current local day are shifted back one
/// day, so `day`/`today` shows yesterday's complete bucket followed by
/// everything since. The end bound is padded by one day and only added for
/// fully elapsed, explicitly dated periods. Literal ranges only bound the
/// start.
pub fn resolve_time_range(
    period: &str,
    date: &str,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<TimeRange, LiveError> {
    let kind = PeriodKind::parse(period)?;
    let date = date.trim();
    let now_local = now.with_timezone(&tz).naive_local();
    let today = now_local.date();

    if kind == PeriodKind::Range {
        // TODO: decide whether literal ranges should also bound the end; the
        // parsed end day is currently discarded.
        let range = parse_date_range(date, today)?;
        return Ok(TimeRange {
            start: local_midnight_utc(tz, range.start)?,
            end: None,
        });
    }

    let expr = DateExpr::parse(date)?;
    let (span, named_day) = match expr {
        DateExpr::Last(n) => (DateRange::trailing(kind, n, today, false)?, None),
        DateExpr::Previous(n) => (DateRange::trailing(kind, n, today, true)?, None),
        _ => {
            let point = expr
                .resolve(now_local)
                .ok_or_else(|| LiveError::InvalidDate(date.to_string()))?;
            let named_day = point.date();
            let mut day = named_day;
            if matches!(expr, DateExpr::Today | DateExpr::Now) || day == today {
                day = day
                    .pred_opt()
                    .ok_or_else(|| LiveError::InvalidDate(date.to_string()))?;
            }
            (DateRange::containing(kind, day)?, Some(named_day))
        }
    };

    let start = local_midnight_utc(tz, span.start)?;
    let end = if end_bound_applies(date, named_day, today) {
        let padded = span
            .end
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| LiveError::InvalidDate(date.to_string()))?;
        Some(local_midnight_utc(tz, padded)?)
    } else {
        None
    };

    Ok(TimeRange { start, end })
}

fn end_bound_applies(date: &str, named_day: Option<NaiveDate>, today: NaiveDate) -> bool {
    if OPEN_ENDED_DATES.contains(&date) || date.contains("last") || date.contains("previous") {
        return false;
    }
    named_day.is_some_and(|day| day != today)
}

/// UTC instant of local midnight on `date`.
///
/// Ambiguous midnights take the earlier instant; midnights skipped by a DST
/// transition move forward to the first valid local time.
pub fn local_midnight_utc(tz: Tz, date: NaiveDate) -> Result<NaiveDateTime, LiveError> {
    let midnight = date.and_time(NaiveTime::MIN);
    for step in 0..=12 {
        let candidate = midnight + Duration::minutes(step * 15);
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return Ok(dt.naive_utc()),
            LocalResult::Ambiguous(a, b) => return Ok(a.min(b).naive_utc()),
            LocalResult::None => continue,
        }
    }
    Err(LiveError::InvalidTimezone(format!("{} at {date}", tz.name())))
}
