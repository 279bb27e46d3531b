//! Operator command-line configuration.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Command-line arguments of the `operator` binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "operator", version, about = "Cron-driven workload scaling and resource cleanup")]
pub struct OperatorConfig {
    /// Print the CronScaleSchedule CRD as YAML and exit.
    #[arg(long)]
    pub generate_crds: bool,

    /// Listen address of the read-only dashboard API.
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8082")]
    pub dashboard_addr: SocketAddr,

    /// Do not start the dashboard API.
    #[arg(long)]
    pub no_dashboard: bool,

    /// Timeout for every Kubernetes API call (connect, read and write).
    #[arg(long, env = "API_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    pub api_timeout: Duration,

    /// Retry delay for schedules whose spec fails validation.
    #[arg(long, env = "INVALID_SPEC_RETRY", default_value = "60s", value_parser = humantime::parse_duration)]
    pub invalid_spec_retry: Duration,

    /// Retry delay after a failed reconciliation or a transient sub-step failure.
    #[arg(long, env = "ERROR_RETRY", default_value = "30s", value_parser = humantime::parse_duration)]
    pub error_retry: Duration,
}

impl OperatorConfig {
    /// Settings consumed by the reconciliation engine.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            invalid_spec_retry: self.invalid_spec_retry,
            error_retry: self.error_retry,
        }
    }
}

/// Retry timing for the reconciliation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Requeue delay when the spec is invalid.
    pub invalid_spec_retry: Duration,
    /// Requeue delay after errors.
    pub error_retry: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            invalid_spec_retry: Duration::from_secs(60),
            error_retry: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_defaults() {
        let config = OperatorConfig::try_parse_from(["operator"]).unwrap();
        assert!(!config.generate_crds);
        assert!(!config.no_dashboard);
        assert_eq!(config.api_timeout, Duration::from_secs(30));
        assert_eq!(config.engine_settings(), EngineSettings::default());
    }

    #[test]
    fn parses_humantime_durations() {
        let config = OperatorConfig::try_parse_from([
            "operator",
            "--api-timeout",
            "5s",
            "--invalid-spec-retry",
            "2m",
            "--error-retry",
            "1m30s",
            "--no-dashboard",
        ])
        .unwrap();

        assert!(config.no_dashboard);
        assert_eq!(config.api_timeout, Duration::from_secs(5));
        assert_eq!(
            config.engine_settings(),
            EngineSettings {
                invalid_spec_retry: Duration::from_secs(120),
                error_retry: Duration::from_secs(90),
            }
        );
    }

    #[test]
    fn rejects_bad_duration() {
        assert!(OperatorConfig::try_parse_from(["operator", "--error-retry", "soon"]).is_err());
    }
}
