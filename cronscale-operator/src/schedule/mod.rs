//! Cron evaluation and time planning.
//!
//! - [`CronExpr`]: a parsed cron expression evaluated in an IANA timezone
//! - [`due`]: whether an action is due given its last execution
//! - [`requeue`]: how long to sleep until the next action
//!
//! Every function here takes `now` as a parameter; nothing reads the wall clock.
//!
//! # Cron Expression Format
//!
//! Standard 6-field cron format, seconds first:
//! ```text
//! sec  min  hour  day  month  weekday
//! 0    0    22    *    *      *
//! ```
//!
//! Classic 5-field expressions (`0 22 * * *`) are accepted and fire at second 0.
//! Numeric weekdays follow classic cron: `0` and `7` are Sunday, `1-5` is
//! Monday to Friday.

pub mod due;
pub mod requeue;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;
use thiserror::Error;

pub use due::{is_due, plan_scaling, ScalingPlan};
pub use requeue::plan_requeue;

/// Errors from parsing schedules and timezones.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScheduleError {
    /// The cron expression does not parse.
    #[error("Invalid cron expression '{expr}': {cause}")]
    InvalidCron {
        /// Expression as written.
        expr: String,
        /// Parser message.
        cause: String,
    },

    /// The timezone is not a known IANA zone.
    #[error("Unknown timezone '{0}'")]
    UnknownTimeZone(String),
}

/// How far back [`CronExpr::latest_at_or_before`] searches, widening each step.
const LOOKBACK_WINDOWS_SECS: [i64; 7] = [
    60,
    3_600,
    86_400,
    8 * 86_400,
    32 * 86_400,
    367 * 86_400,
    8 * 367 * 86_400,
];

/// A parsed cron expression.
#[derive(Debug, Clone)]
pub struct CronExpr {
    schedule: Schedule,
    expr: String,
}

impl CronExpr {
    /// Parse a 6-field (or classic 5-field) cron expression.
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let trimmed = expr.trim();
        let mut fields: Vec<String> = trimmed.split_whitespace().map(str::to_string).collect();
        if fields.len() == 5 {
            fields.insert(0, "0".to_string());
        }
        if let Some(weekday) = fields.get_mut(5) {
            *weekday = renumber_weekdays(weekday);
        }
        let normalized = fields.join(" ");

        let schedule = Schedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidCron {
            expr: expr.to_string(),
            cause: e.to_string(),
        })?;

        Ok(Self {
            schedule,
            expr: trimmed.to_string(),
        })
    }

    /// The expression as written (trimmed).
    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// First occurrence strictly after `instant`, evaluated in `tz`.
    pub fn next_after(&self, instant: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&instant.with_timezone(&tz))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Most recent occurrence at or before `instant`, evaluated in `tz`.
    ///
    /// Returns `None` when nothing fired within the widest lookback window.
    pub fn latest_at_or_before(&self, instant: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        for window in LOOKBACK_WINDOWS_SECS {
            let start = instant - Duration::seconds(window);
            let latest = self
                .schedule
                .after(&start.with_timezone(&tz))
                .map(|t| t.with_timezone(&Utc))
                .take_while(|t| *t <= instant)
                .last();
            if latest.is_some() {
                return latest;
            }
        }
        None
    }
}

/// Rewrite a day-of-week field from classic numbering (Sunday = 0 or 7) to
/// the `cron` crate's (Sunday = 1, Saturday = 7).
///
/// Numeric items are expanded to an explicit day list. Named days and
/// anything unrecognised pass through for the parser to judge.
fn renumber_weekdays(field: &str) -> String {
    field
        .split(',')
        .map(|item| renumber_weekday_item(item).unwrap_or_else(|| item.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

fn renumber_weekday_item(item: &str) -> Option<String> {
    if item == "*" || item == "?" {
        return None;
    }

    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step.parse::<u32>().ok().filter(|s| *s > 0)?)),
        None => (item, None),
    };

    let (first, last) = match base {
        "*" => (0, 6),
        _ => match base.split_once('-') {
            Some((a, b)) => (a.parse::<u32>().ok()?, b.parse::<u32>().ok()?),
            None => {
                let day = base.parse::<u32>().ok()?;
                (day, if step.is_some() { 6 } else { day })
            }
        },
    };
    if first > last || last > 7 {
        return None;
    }

    let mut days: Vec<u32> = (first..=last)
        .step_by(step.unwrap_or(1) as usize)
        .map(|day| if day == 7 { 1 } else { day + 1 })
        .collect();
    days.sort_unstable();
    days.dedup();

    Some(
        days.iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Resolve an IANA timezone name.
pub fn parse_time_zone(name: &str) -> Result<Tz, ScheduleError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ScheduleError::UnknownTimeZone(name.to_string()))
}

/// Next occurrence of an optional schedule after `now`.
///
/// Empty or unparseable schedules yield `None`.
pub fn next_occurrence(schedule: &str, now: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    if schedule.trim().is_empty() {
        return None;
    }
    CronExpr::parse(schedule)
        .ok()
        .and_then(|expr| expr.next_after(now, tz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn parses_six_field_expression() {
        let expr = CronExpr::parse("0 30 9 * * Mon-Fri").unwrap();
        assert_eq!(expr.as_str(), "0 30 9 * * Mon-Fri");
    }

    #[test]
    fn five_field_expression_fires_on_second_zero() {
        let expr = CronExpr::parse("0 22 * * *").unwrap();
        let next = expr
            .next_after(utc(2025, 3, 10, 12, 0, 0), chrono_tz::UTC)
            .unwrap();
        assert_eq!(next, utc(2025, 3, 10, 22, 0, 0));
    }

    #[test]
    fn numeric_weekdays_use_classic_numbering() {
        // Saturday evening.
        let sat = utc(2025, 3, 8, 23, 0, 0);

        let weekdays = CronExpr::parse("0 0 22 * * 1-5").unwrap();
        assert_eq!(
            weekdays.next_after(sat, chrono_tz::UTC),
            Some(utc(2025, 3, 10, 22, 0, 0))
        );

        for sunday in ["0 0 22 * * 0", "0 0 22 * * 7", "0 22 * * 0"] {
            let expr = CronExpr::parse(sunday).unwrap();
            assert_eq!(
                expr.next_after(sat, chrono_tz::UTC),
                Some(utc(2025, 3, 9, 22, 0, 0)),
                "{}",
                sunday
            );
        }

        let friday = CronExpr::parse("0 0 22 * * 5").unwrap();
        assert_eq!(
            friday.next_after(sat, chrono_tz::UTC),
            Some(utc(2025, 3, 14, 22, 0, 0))
        );
    }

    #[test]
    fn renumbers_weekday_lists_ranges_and_steps() {
        assert_eq!(renumber_weekdays("1-5"), "2,3,4,5,6");
        assert_eq!(renumber_weekdays("0,6"), "1,7");
        assert_eq!(renumber_weekdays("5-7"), "1,6,7");
        assert_eq!(renumber_weekdays("*/2"), "1,3,5,7");
        assert_eq!(renumber_weekdays("1/3"), "2,5");
        assert_eq!(renumber_weekdays("*"), "*");
        assert_eq!(renumber_weekdays("Mon-Fri"), "Mon-Fri");
        assert_eq!(renumber_weekdays("9"), "9");
    }

    #[test]
    fn rejects_garbage() {
        let err = CronExpr::parse("every tuesday").unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidCron { .. }));
    }

    #[test]
    fn next_after_is_strict() {
        let expr = CronExpr::parse("0 0 22 * * *").unwrap();
        let at = utc(2025, 3, 10, 22, 0, 0);
        assert_eq!(
            expr.next_after(at, chrono_tz::UTC),
            Some(utc(2025, 3, 11, 22, 0, 0))
        );
    }

    #[test]
    fn evaluates_in_schedule_timezone() {
        let expr = CronExpr::parse("0 0 22 * * *").unwrap();
        let tz = parse_time_zone("Europe/Berlin").unwrap();
        // 22:00 CET is 21:00 UTC in winter.
        let next = expr.next_after(utc(2025, 1, 15, 12, 0, 0), tz).unwrap();
        assert_eq!(next, utc(2025, 1, 15, 21, 0, 0));
    }

    #[test]
    fn latest_at_or_before_is_inclusive() {
        let expr = CronExpr::parse("0 0 6 * * *").unwrap();
        let at = utc(2025, 3, 10, 6, 0, 0);
        assert_eq!(expr.latest_at_or_before(at, chrono_tz::UTC), Some(at));

        let later = utc(2025, 3, 10, 5, 59, 59);
        assert_eq!(
            expr.latest_at_or_before(later, chrono_tz::UTC),
            Some(utc(2025, 3, 9, 6, 0, 0))
        );
    }

    #[test]
    fn latest_at_or_before_widens_for_sparse_schedules() {
        // First of each month at midnight.
        let expr = CronExpr::parse("0 0 0 1 * *").unwrap();
        let at = utc(2025, 3, 20, 8, 0, 0);
        assert_eq!(
            expr.latest_at_or_before(at, chrono_tz::UTC),
            Some(utc(2025, 3, 1, 0, 0, 0))
        );
    }

    #[test]
    fn unknown_timezone() {
        assert_eq!(
            parse_time_zone("Mars/Olympus_Mons"),
            Err(ScheduleError::UnknownTimeZone("Mars/Olympus_Mons".into()))
        );
        assert!(parse_time_zone("America/New_York").is_ok());
    }

    #[test]
    fn next_occurrence_of_empty_schedule() {
        assert_eq!(
            next_occurrence("", utc(2025, 1, 1, 0, 0, 0), chrono_tz::UTC),
            None
        );
    }
}
