//! Scalable workloads.
//!
//! Deployments and StatefulSets share the same scaling surface, so the
//! actuator is written once against [`Scalable`] and each kind implements it.

use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Workload kinds that can be scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    /// apps/v1 Deployment.
    Deployment,
    /// apps/v1 StatefulSet.
    StatefulSet,
}

impl WorkloadKind {
    /// Parse a `targetRef.kind` value.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "Deployment" => Some(Self::Deployment),
            "StatefulSet" => Some(Self::StatefulSet),
            _ => None,
        }
    }

    /// Kubernetes kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::StatefulSet => "StatefulSet",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replica and annotation access shared by scalable kinds.
pub trait Scalable {
    /// Desired replica count. An unset count is the Kubernetes default of 1.
    fn replicas(&self) -> i32;

    /// Set the desired replica count.
    fn set_replicas(&mut self, replicas: i32);

    /// Object annotations, if any.
    fn annotations(&self) -> Option<&BTreeMap<String, String>>;

    /// Mutable annotations, created empty when absent.
    fn annotations_mut(&mut self) -> &mut BTreeMap<String, String>;

    /// Single annotation value.
    fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }
}

impl Scalable for Deployment {
    fn replicas(&self) -> i32 {
        self.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1)
    }

    fn set_replicas(&mut self, replicas: i32) {
        self.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
    }

    fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata.annotations.as_ref()
    }

    fn annotations_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.metadata.annotations.get_or_insert_with(BTreeMap::new)
    }
}

impl Scalable for StatefulSet {
    fn replicas(&self) -> i32 {
        self.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1)
    }

    fn set_replicas(&mut self, replicas: i32) {
        self.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
    }

    fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata.annotations.as_ref()
    }

    fn annotations_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.metadata.annotations.get_or_insert_with(BTreeMap::new)
    }
}

/// A fetched target workload.
#[derive(Debug, Clone)]
pub enum Workload {
    /// A Deployment.
    Deployment(Deployment),
    /// A StatefulSet.
    StatefulSet(StatefulSet),
}

impl Workload {
    /// Kind of the wrapped object.
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::Deployment(_) => WorkloadKind::Deployment,
            Workload::StatefulSet(_) => WorkloadKind::StatefulSet,
        }
    }

    /// Object name.
    pub fn name(&self) -> &str {
        let meta = match self {
            Workload::Deployment(d) => &d.metadata,
            Workload::StatefulSet(s) => &s.metadata,
        };
        meta.name.as_deref().unwrap_or_default()
    }

    /// Live replica status, as shown on the dashboard.
    pub fn target_status(&self) -> TargetStatus {
        match self {
            Workload::Deployment(d) => {
                let status = d.status.clone().unwrap_or_default();
                let last_update_time = status
                    .conditions
                    .as_ref()
                    .and_then(|c| c.iter().find(|c| c.type_ == "Progressing"))
                    .and_then(|c| c.last_update_time.as_ref())
                    .map(|t| t.0);
                TargetStatus {
                    ready: status.ready_replicas.unwrap_or(0) == status.replicas.unwrap_or(0),
                    desired_replicas: self.replicas(),
                    available_replicas: status.available_replicas.unwrap_or(0),
                    ready_replicas: status.ready_replicas.unwrap_or(0),
                    last_update_time,
                }
            }
            Workload::StatefulSet(s) => {
                let status = s.status.clone().unwrap_or_default();
                let last_update_time = status
                    .observed_generation
                    .filter(|g| *g > 0)
                    .and(s.metadata.creation_timestamp.as_ref())
                    .map(|t| t.0);
                TargetStatus {
                    ready: status.ready_replicas.unwrap_or(0) == status.replicas,
                    desired_replicas: self.replicas(),
                    available_replicas: status.available_replicas.unwrap_or(status.replicas),
                    ready_replicas: status.ready_replicas.unwrap_or(0),
                    last_update_time,
                }
            }
        }
    }
}

impl Scalable for Workload {
    fn replicas(&self) -> i32 {
        match self {
            Workload::Deployment(d) => d.replicas(),
            Workload::StatefulSet(s) => s.replicas(),
        }
    }

    fn set_replicas(&mut self, replicas: i32) {
        match self {
            Workload::Deployment(d) => d.set_replicas(replicas),
            Workload::StatefulSet(s) => s.set_replicas(replicas),
        }
    }

    fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Workload::Deployment(d) => d.annotations(),
            Workload::StatefulSet(s) => s.annotations(),
        }
    }

    fn annotations_mut(&mut self) -> &mut BTreeMap<String, String> {
        match self {
            Workload::Deployment(d) => d.annotations_mut(),
            Workload::StatefulSet(s) => s.annotations_mut(),
        }
    }
}

/// Read-only snapshot of a target's replica health.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetStatus {
    /// All current replicas are ready.
    pub ready: bool,
    /// Desired replica count from the spec.
    pub desired_replicas: i32,
    /// Available replicas.
    pub available_replicas: i32,
    /// Ready replicas.
    pub ready_replicas: i32,
    /// Last progress update, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}
