//! Due checks anchored on the last execution.
//!
//! An action is due when `now` has reached the first occurrence after its
//! last recorded run. Anchoring on the last run (not on process start) means a
//! window missed during downtime is still caught on the next pass.

use super::CronExpr;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Whether `schedule` is due at `now` given its last execution.
///
/// A missing last execution counts from the Unix epoch. Empty and unparseable
/// schedules are never due; a broken expression must not block other actions.
pub fn is_due(
    schedule: &str,
    now: DateTime<Utc>,
    last_execution: Option<DateTime<Utc>>,
    tz: Tz,
) -> bool {
    if schedule.trim().is_empty() {
        return false;
    }

    let expr = match CronExpr::parse(schedule) {
        Ok(expr) => expr,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping due check for unparseable schedule");
            return false;
        }
    };

    let anchor = last_execution.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    match expr.next_after(anchor, tz) {
        Some(next) => now >= next,
        None => false,
    }
}

/// Scaling work for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingPlan {
    /// Nothing is due.
    Idle,
    /// Scale to zero. `supersedes_up` is set when scale-up was also due.
    ScaleDown {
        /// Scale-up was due too and is skipped in favour of this action.
        supersedes_up: bool,
    },
    /// Restore the remembered replica count.
    ScaleUp {
        /// Scale-down was due too and is skipped in favour of this action.
        supersedes_down: bool,
    },
}

/// Decide which scaling action to run.
///
/// When both are due (first reconciliation, or after downtime spanning both
/// windows) the one whose most recent occurrence is later wins, so the
/// workload ends in the state the schedules currently call for. Ties go to
/// scale-down.
pub fn plan_scaling(
    scale_down_schedule: &str,
    scale_up_schedule: &str,
    now: DateTime<Utc>,
    last_scale_down: Option<DateTime<Utc>>,
    last_scale_up: Option<DateTime<Utc>>,
    tz: Tz,
) -> ScalingPlan {
    let down_due = is_due(scale_down_schedule, now, last_scale_down, tz);
    let up_due = is_due(scale_up_schedule, now, last_scale_up, tz);

    match (down_due, up_due) {
        (false, false) => ScalingPlan::Idle,
        (true, false) => ScalingPlan::ScaleDown {
            supersedes_up: false,
        },
        (false, true) => ScalingPlan::ScaleUp {
            supersedes_down: false,
        },
        (true, true) => {
            let latest = |schedule: &str| {
                CronExpr::parse(schedule)
                    .ok()
                    .and_then(|expr| expr.latest_at_or_before(now, tz))
            };
            let down = latest(scale_down_schedule);
            let up = latest(scale_up_schedule);

            if up > down {
                ScalingPlan::ScaleUp {
                    supersedes_down: true,
                }
            } else {
                ScalingPlan::ScaleDown {
                    supersedes_up: true,
                }
            }
        }
    }
}
