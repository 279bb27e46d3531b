//! Static validation of CronScaleSchedule specs.
//!
//! Runs before any time logic. A spec that fails here cannot produce a
//! meaningful next occurrence, so the controller backs off for a fixed
//! interval instead of computing a requeue.

use crate::cleanup::kinds::SUPPORTED_CLEANUP_KINDS;
use crate::crd::{CleanupConfig, CronScaleScheduleSpec, TargetRef};
use crate::schedule::{parse_time_zone, CronExpr};
use crate::workload::WorkloadKind;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Maximum length of a cron schedule string.
pub const MAX_SCHEDULE_LENGTH: usize = 100;

/// The only workload API version the operator scales.
pub const SUPPORTED_TARGET_API_VERSION: &str = "apps/v1";

/// Restricts timezone names to IANA-shaped identifiers (no shell or path metacharacters).
static TIME_ZONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]+(?:[_/][A-Za-z0-9_+-]+)*$").unwrap_or_else(|_| {
        panic!("Static regex 'TIME_ZONE_PATTERN' failed to compile - this is a bug in the operator")
    })
});

/// Reasons a schedule spec is rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Scale-down, scale-up and cleanup schedules are all empty.
    #[error("all schedules (scaleDownSchedule, scaleUpSchedule, cleanupSchedule) are empty")]
    NoSchedules,

    /// A schedule string is longer than [`MAX_SCHEDULE_LENGTH`].
    #[error("{field} exceeds maximum length of {max} characters")]
    ScheduleTooLong {
        /// Offending field.
        field: &'static str,
        /// Length limit.
        max: usize,
    },

    /// A schedule string is unusable.
    #[error("invalid {field}: {reason}")]
    InvalidSchedule {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Cleanup configuration problem.
    #[error("invalid cleanupConfig: {0}")]
    InvalidCleanupConfig(String),

    /// Timezone problem.
    #[error("invalid timeZone: {0}")]
    InvalidTimeZone(String),

    /// Target reference problem.
    #[error("invalid targetRef: {0}")]
    InvalidTargetRef(String),
}

/// Validate a schedule spec. All rules must hold.
pub fn validate_spec(spec: &CronScaleScheduleSpec) -> Result<(), ValidationError> {
    let schedules = [
        ("scaleDownSchedule", spec.scale_down_schedule.as_str()),
        ("scaleUpSchedule", spec.scale_up_schedule.as_str()),
        ("cleanupSchedule", spec.cleanup_schedule.as_str()),
    ];

    if schedules.iter().all(|(_, s)| s.is_empty()) {
        return Err(ValidationError::NoSchedules);
    }

    for (field, schedule) in schedules {
        if schedule.len() > MAX_SCHEDULE_LENGTH {
            return Err(ValidationError::ScheduleTooLong {
                field,
                max: MAX_SCHEDULE_LENGTH,
            });
        }
    }

    for (field, schedule) in schedules {
        if !schedule.is_empty() {
            validate_cron_schedule(schedule).map_err(|reason| {
                ValidationError::InvalidSchedule { field, reason }
            })?;
        }
    }

    if !spec.cleanup_schedule.is_empty() {
        validate_cleanup_config(spec.cleanup_config.as_ref())?;
    }

    validate_time_zone(&spec.time_zone)?;

    if !spec.scale_down_schedule.is_empty() || !spec.scale_up_schedule.is_empty() {
        let target = spec.target_ref.as_ref().ok_or_else(|| {
            ValidationError::InvalidTargetRef(
                "targetRef is required when scaling schedules are provided".into(),
            )
        })?;
        validate_target_ref(target)?;
    }

    Ok(())
}

fn validate_cron_schedule(schedule: &str) -> Result<(), String> {
    let schedule = schedule.trim();
    if schedule.is_empty() {
        return Err("schedule cannot be empty after trimming".into());
    }

    if schedule.contains("..") || schedule.contains("//") {
        return Err("schedule contains potentially dangerous patterns".into());
    }

    CronExpr::parse(schedule).map(|_| ()).map_err(|e| e.to_string())
}

fn validate_cleanup_config(config: Option<&CleanupConfig>) -> Result<(), ValidationError> {
    let config = config.ok_or_else(|| {
        ValidationError::InvalidCleanupConfig(
            "cleanup config is required when cleanup schedule is provided".into(),
        )
    })?;

    if config.annotation_key.is_empty() {
        return Err(ValidationError::InvalidCleanupConfig(
            "cleanup annotation key cannot be empty".into(),
        ));
    }

    if config.resource_types.is_empty() {
        return Err(ValidationError::InvalidCleanupConfig(
            "at least one resource type must be specified for cleanup".into(),
        ));
    }

    if let Some(unsupported) = config
        .resource_types
        .iter()
        .find(|t| !SUPPORTED_CLEANUP_KINDS.contains(&t.as_str()))
    {
        return Err(ValidationError::InvalidCleanupConfig(format!(
            "unsupported resource type for cleanup: {}",
            unsupported
        )));
    }

    Ok(())
}

fn validate_time_zone(time_zone: &str) -> Result<(), ValidationError> {
    let time_zone = time_zone.trim();
    if time_zone.is_empty() {
        return Err(ValidationError::InvalidTimeZone("timeZone is empty".into()));
    }

    if !TIME_ZONE_PATTERN.is_match(time_zone) {
        return Err(ValidationError::InvalidTimeZone(
            "timezone contains invalid characters".into(),
        ));
    }

    parse_time_zone(time_zone)
        .map(|_| ())
        .map_err(|e| ValidationError::InvalidTimeZone(e.to_string()))
}

fn validate_target_ref(target: &TargetRef) -> Result<(), ValidationError> {
    let required = [
        ("name", &target.name),
        ("namespace", &target.namespace),
        ("kind", &target.kind),
        ("apiVersion", &target.api_version),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.is_empty()) {
        return Err(ValidationError::InvalidTargetRef(format!(
            "target {} cannot be empty",
            field
        )));
    }

    if WorkloadKind::from_kind(&target.kind).is_none() {
        return Err(ValidationError::InvalidTargetRef(format!(
            "unsupported target kind: {}",
            target.kind
        )));
    }

    if target.api_version != SUPPORTED_TARGET_API_VERSION {
        return Err(ValidationError::InvalidTargetRef(format!(
            "unsupported API version: {}",
            target.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetRef {
        TargetRef {
            name: "web".to_string(),
            namespace: "default".to_string(),
            kind: "Deployment".to_string(),
            api_version: "apps/v1".to_string(),
        }
    }

    fn scaling_spec() -> CronScaleScheduleSpec {
        CronScaleScheduleSpec {
            target_ref: Some(target()),
            scale_down_schedule: "0 0 22 * * *".to_string(),
            scale_up_schedule: "0 0 6 * * *".to_string(),
            time_zone: "UTC".to_string(),
            ..Default::default()
        }
    }

    fn cleanup_spec() -> CronScaleScheduleSpec {
        CronScaleScheduleSpec {
            cleanup_schedule: "*/30 * * * * *".to_string(),
            cleanup_config: Some(CleanupConfig {
                annotation_key: "cronscale.io/cleanup-after".to_string(),
                resource_types: vec!["ConfigMap".to_string(), "ClusterRole".to_string()],
                ..Default::default()
            }),
            time_zone: "UTC".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_valid_specs() {
        assert_eq!(validate_spec(&scaling_spec()), Ok(()));
        assert_eq!(validate_spec(&cleanup_spec()), Ok(()));
    }

    #[test]
    fn rejects_spec_without_schedules() {
        let spec = CronScaleScheduleSpec {
            target_ref: Some(target()),
            time_zone: "UTC".to_string(),
            ..Default::default()
        };
        assert_eq!(validate_spec(&spec), Err(ValidationError::NoSchedules));
    }

    #[test]
    fn rejects_overlong_schedule() {
        let mut spec = scaling_spec();
        spec.scale_up_schedule = format!("0 0 6 * * {}", "*".repeat(MAX_SCHEDULE_LENGTH));
        assert!(matches!(
            validate_spec(&spec),
            Err(ValidationError::ScheduleTooLong {
                field: "scaleUpSchedule",
                ..
            })
        ));
    }

    #[test]
    fn rejects_dangerous_patterns() {
        let mut spec = scaling_spec();
        spec.scale_down_schedule = "0 0 22 * * ../..".to_string();
        assert!(matches!(
            validate_spec(&spec),
            Err(ValidationError::InvalidSchedule {
                field: "scaleDownSchedule",
                ..
            })
        ));

        spec.scale_down_schedule = "0 0 22 * //".to_string();
        assert!(validate_spec(&spec).is_err());
    }

    #[test]
    fn rejects_whitespace_only_schedule() {
        let mut spec = scaling_spec();
        spec.scale_up_schedule = "   ".to_string();
        assert!(matches!(
            validate_spec(&spec),
            Err(ValidationError::InvalidSchedule { .. })
        ));
    }

    #[test]
    fn rejects_unparseable_cron() {
        let mut spec = scaling_spec();
        spec.scale_down_schedule = "at ten".to_string();
        assert!(matches!(
            validate_spec(&spec),
            Err(ValidationError::InvalidSchedule { .. })
        ));
    }

    #[test]
    fn cleanup_schedule_requires_config() {
        let mut spec = cleanup_spec();
        spec.cleanup_config = None;
        assert!(matches!(
            validate_spec(&spec),
            Err(ValidationError::InvalidCleanupConfig(_))
        ));
    }

    #[test]
    fn cleanup_config_requires_annotation_and_types() {
        let mut spec = cleanup_spec();
        if let Some(config) = spec.cleanup_config.as_mut() {
            config.annotation_key.clear();
        }
        assert!(validate_spec(&spec).is_err());

        let mut spec = cleanup_spec();
        if let Some(config) = spec.cleanup_config.as_mut() {
            config.resource_types.clear();
        }
        assert!(validate_spec(&spec).is_err());
    }

    #[test]
    fn rejects_unsupported_cleanup_kind() {
        let mut spec = cleanup_spec();
        if let Some(config) = spec.cleanup_config.as_mut() {
            config.resource_types = vec!["Pod".to_string()];
        }
        let err = validate_spec(&spec).unwrap_err();
        assert!(err.to_string().contains("Pod"));
    }

    #[test]
    fn rejects_bad_time_zones() {
        for tz in ["", "Europe/Berlin; rm -rf /", "../etc/passwd", "Mars/Base"] {
            let mut spec = scaling_spec();
            spec.time_zone = tz.to_string();
            assert!(
                matches!(validate_spec(&spec), Err(ValidationError::InvalidTimeZone(_))),
                "expected {:?} to be rejected",
                tz
            );
        }

        let mut spec = scaling_spec();
        spec.time_zone = "America/Argentina/Buenos_Aires".to_string();
        assert_eq!(validate_spec(&spec), Ok(()));
    }

    #[test]
    fn scaling_requires_target() {
        let mut spec = scaling_spec();
        spec.target_ref = None;
        assert!(matches!(
            validate_spec(&spec),
            Err(ValidationError::InvalidTargetRef(_))
        ));
    }

    #[test]
    fn rejects_bad_target_fields() {
        let mut spec = scaling_spec();
        if let Some(t) = spec.target_ref.as_mut() {
            t.kind = "DaemonSet".to_string();
        }
        assert!(validate_spec(&spec)
            .unwrap_err()
            .to_string()
            .contains("DaemonSet"));

        let mut spec = scaling_spec();
        if let Some(t) = spec.target_ref.as_mut() {
            t.api_version = "apps/v1beta1".to_string();
        }
        assert!(validate_spec(&spec).is_err());

        let mut spec = scaling_spec();
        if let Some(t) = spec.target_ref.as_mut() {
            t.namespace.clear();
        }
        assert!(validate_spec(&spec)
            .unwrap_err()
            .to_string()
            .contains("namespace"));
    }
}
