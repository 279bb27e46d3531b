//! Cleanup eligibility.
//!
//! A resource is reaped when it carries the configured annotation and the
//! expiry it encodes has been reached, or, with orphan cleanup enabled, when
//! it has no annotation and is at least `orphanResourceMaxAge` old. Both
//! comparisons are inclusive.

use super::kinds::Candidate;
use crate::crd::CleanupConfig;
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// When an annotated resource expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Empty annotation value: reap on the next pass.
    Immediate,
    /// A duration counted from the resource's creation time ("24h", "7d").
    AfterCreation(Duration),
    /// An absolute instant (RFC3339, or midnight UTC of a bare date).
    At(DateTime<Utc>),
}

impl Expiry {
    /// Parse an annotation value. Formats are tried in order: duration,
    /// RFC3339 timestamp, `YYYY-MM-DD` date.
    ///
    /// Only a truly empty value is immediate; whitespace is an invalid value.
    pub fn parse(value: &str) -> Option<Self> {
        if value.is_empty() {
            return Some(Expiry::Immediate);
        }
        let value = value.trim();

        if let Some(duration) = parse_duration(value) {
            return Some(Expiry::AfterCreation(duration));
        }

        if let Ok(at) = DateTime::parse_from_rfc3339(value) {
            return Some(Expiry::At(at.with_timezone(&Utc)));
        }

        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|midnight| Expiry::At(midnight.and_utc()))
    }
}

/// Parse a duration string such as "90s", "24h", "1h30m" or "7d".
pub fn parse_duration(value: &str) -> Option<Duration> {
    humantime::parse_duration(value.trim())
        .ok()
        .and_then(|d| Duration::from_std(d).ok())
}

/// Eligibility rules for one cleanup pass.
#[derive(Debug, Clone)]
pub struct CleanupPolicy {
    annotation_key: String,
    orphan_max_age: Option<Duration>,
}

impl CleanupPolicy {
    /// Build the policy for a pass.
    ///
    /// An unparseable or missing `orphanResourceMaxAge` disables orphan
    /// cleanup for this pass only.
    pub fn from_config(config: &CleanupConfig) -> Self {
        let orphan_max_age = if config.cleanup_orphan_resources {
            let raw = config.orphan_resource_max_age.as_deref().unwrap_or_default();
            match parse_duration(raw) {
                Some(age) => Some(age),
                None => {
                    tracing::warn!(
                        value = %raw,
                        "Invalid orphanResourceMaxAge, orphan cleanup disabled for this pass"
                    );
                    None
                }
            }
        } else {
            None
        };

        Self {
            annotation_key: config.annotation_key.clone(),
            orphan_max_age,
        }
    }

    /// Maximum orphan age in effect, if orphan cleanup is active.
    pub fn orphan_max_age(&self) -> Option<Duration> {
        self.orphan_max_age
    }

    /// Whether `candidate` should be reaped at `now`.
    pub fn should_cleanup(&self, candidate: &Candidate, now: DateTime<Utc>) -> bool {
        match candidate.annotations.get(&self.annotation_key) {
            Some(value) => self.annotation_expired(candidate, value, now),
            None => self.orphan_expired(candidate, now),
        }
    }

    fn annotation_expired(&self, candidate: &Candidate, value: &str, now: DateTime<Utc>) -> bool {
        let expiry = match Expiry::parse(value) {
            Some(expiry) => expiry,
            None => {
                tracing::warn!(
                    kind = %candidate.kind,
                    name = %candidate.name,
                    value = %value,
                    "Invalid cleanup annotation; expected a duration (24h, 7d), RFC3339 time or YYYY-MM-DD date"
                );
                return false;
            }
        };

        let deadline = match expiry {
            Expiry::Immediate => {
                tracing::info!(
                    kind = %candidate.kind,
                    name = %candidate.name,
                    "Resource marked for immediate cleanup"
                );
                return true;
            }
            Expiry::AfterCreation(duration) => match candidate.created {
                Some(created) => created + duration,
                None => {
                    tracing::warn!(
                        kind = %candidate.kind,
                        name = %candidate.name,
                        "Resource has no creation timestamp, cannot apply duration expiry"
                    );
                    return false;
                }
            },
            Expiry::At(at) => at,
        };

        let due = now >= deadline;
        if due {
            tracing::info!(
                kind = %candidate.kind,
                name = %candidate.name,
                deadline = %deadline,
                "Resource cleanup time reached"
            );
        }
        due
    }

    fn orphan_expired(&self, candidate: &Candidate, now: DateTime<Utc>) -> bool {
        let (Some(max_age), Some(created)) = (self.orphan_max_age, candidate.created) else {
            return false;
        };

        let age = now - created;
        let due = age >= max_age;
        if due {
            tracing::info!(
                kind = %candidate.kind,
                name = %candidate.name,
                age_secs = age.num_seconds(),
                "Orphan resource exceeded max age"
            );
        }
        due
    }
}
