//! Requeue planning.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Shortest wait from `now` to the earliest occurrence strictly in the future.
///
/// Occurrences at or before `now` are the ones just acted on and are ignored.
/// Returns `None` when nothing lies ahead; the schedule then waits for a
/// change to its object.
pub fn plan_requeue(now: DateTime<Utc>, next_occurrences: &[Option<DateTime<Utc>>]) -> Option<Duration> {
    next_occurrences
        .iter()
        .flatten()
        .filter(|t| **t > now)
        .min()
        .and_then(|soonest| (*soonest - now).to_std().ok())
}
