//! Cleanup reaper.
//!
//! Walks every `(resourceType, namespace)` pair named by a [`CleanupConfig`],
//! classifies each listed resource with [`CleanupPolicy`] and deletes (or, in
//! dry-run mode, only counts) the ones that are due. A failing pair is logged
//! and skipped; the pass itself only fails when it has nowhere to look.

pub mod kinds;
pub mod policy;

pub use kinds::{Candidate, CandidateLister, KindRegistry, SUPPORTED_CLEANUP_KINDS};
pub use policy::{CleanupPolicy, Expiry};

use crate::crd::CleanupConfig;
use crate::error::{OperatorError, OperatorResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A kind/namespace pair (or a single resource in it) that could not be processed.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupFailure {
    /// Resource kind.
    pub kind: String,
    /// Namespace; `None` for cluster-scoped kinds.
    pub namespace: Option<String>,
    /// What went wrong.
    pub cause: String,
}

/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupReport {
    /// Resources deleted, or that would have been deleted in dry-run mode.
    pub count: i32,
    /// Whether the pass ran in dry-run mode.
    pub dry_run: bool,
    /// Pairs or resources that failed.
    pub failures: Vec<CleanupFailure>,
}

/// Deletes expired and orphaned resources.
#[derive(Clone)]
pub struct CleanupReaper {
    registry: Arc<KindRegistry>,
}

impl CleanupReaper {
    /// Create a reaper over the given kind registry.
    pub fn new(registry: Arc<KindRegistry>) -> Self {
        Self { registry }
    }

    /// Run one cleanup pass at `now`.
    ///
    /// `default_namespace` is used when the config names no namespaces.
    pub async fn cleanup(
        &self,
        config: &CleanupConfig,
        default_namespace: &str,
        now: DateTime<Utc>,
    ) -> OperatorResult<CleanupReport> {
        let namespaces = resolve_namespaces(config, default_namespace)?;
        let selector = label_selector(&config.label_selector);
        let policy = CleanupPolicy::from_config(config);

        let mut report = CleanupReport {
            dry_run: config.dry_run,
            ..Default::default()
        };

        for kind in &config.resource_types {
            let Some(lister) = self.registry.get(kind) else {
                tracing::warn!(kind = %kind, "No lister registered for cleanup kind, skipping");
                report.failures.push(CleanupFailure {
                    kind: kind.clone(),
                    namespace: None,
                    cause: OperatorError::UnsupportedKind(kind.clone()).to_string(),
                });
                continue;
            };

            // Cluster-scoped kinds are listed once, not once per namespace.
            let scopes: Vec<Option<&str>> = if lister.cluster_scoped() {
                vec![None]
            } else {
                namespaces.iter().map(|ns| Some(ns.as_str())).collect()
            };

            for namespace in scopes {
                self.reap_scope(lister, namespace, selector.as_deref(), &policy, now, &mut report)
                    .await;
            }
        }

        tracing::info!(
            count = report.count,
            dry_run = report.dry_run,
            failures = report.failures.len(),
            "Cleanup pass completed"
        );

        Ok(report)
    }

    async fn reap_scope(
        &self,
        lister: &Arc<dyn CandidateLister>,
        namespace: Option<&str>,
        selector: Option<&str>,
        policy: &CleanupPolicy,
        now: DateTime<Utc>,
        report: &mut CleanupReport,
    ) {
        let candidates = match lister.list(namespace, selector).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(
                    kind = %lister.kind(),
                    namespace = ?namespace,
                    error = %e,
                    "Failed to list cleanup candidates, skipping"
                );
                report.failures.push(CleanupFailure {
                    kind: lister.kind().to_string(),
                    namespace: namespace.map(String::from),
                    cause: e.to_string(),
                });
                return;
            }
        };

        for candidate in candidates.iter().filter(|c| policy.should_cleanup(c, now)) {
            if report.dry_run {
                tracing::info!(
                    kind = %candidate.kind,
                    name = %candidate.name,
                    namespace = ?candidate.namespace,
                    "DRY RUN: would delete resource"
                );
                report.count += 1;
                continue;
            }

            match lister.delete(candidate).await {
                Ok(()) => {
                    tracing::info!(
                        kind = %candidate.kind,
                        name = %candidate.name,
                        namespace = ?candidate.namespace,
                        "Deleted resource"
                    );
                    report.count += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        kind = %candidate.kind,
                        name = %candidate.name,
                        namespace = ?candidate.namespace,
                        error = %e,
                        "Failed to delete resource"
                    );
                    report.failures.push(CleanupFailure {
                        kind: candidate.kind.clone(),
                        namespace: candidate.namespace.clone(),
                        cause: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Namespaces to scan: the configured list, or the default.
pub fn resolve_namespaces(
    config: &CleanupConfig,
    default_namespace: &str,
) -> OperatorResult<Vec<String>> {
    let namespaces: Vec<String> = config
        .namespaces
        .iter()
        .filter(|ns| !ns.is_empty())
        .cloned()
        .collect();

    if !namespaces.is_empty() {
        return Ok(namespaces);
    }

    if default_namespace.is_empty() {
        return Err(OperatorError::InvalidConfig(
            "cleanup has no namespaces and the schedule has no namespace".to_string(),
        ));
    }

    Ok(vec![default_namespace.to_string()])
}

/// Equality selector string (`a=1,b=2`), `None` when no labels are set.
pub fn label_selector(labels: &BTreeMap<String, String>) -> Option<String> {
    if labels.is_empty() {
        return None;
    }
    Some(
        labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(","),
    )
}
