//! CronScaleSchedule Custom Resource Definition.
//!
//! Declares when a workload is scaled to zero and back, and when annotated
//! resources are reaped.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CronScaleSchedule is the Schema for the cronscaleschedules API.
///
/// Three independent cron schedules drive the operator: scale-down, scale-up
/// and cleanup. Any of them may be left empty, but not all three.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cronscale.io",
    version = "v1",
    kind = "CronScaleSchedule",
    plural = "cronscaleschedules",
    shortname = "css",
    namespaced,
    status = "CronScaleScheduleStatus",
    printcolumn = r#"{"name":"Target", "type":"string", "jsonPath":".spec.targetRef.name"}"#,
    printcolumn = r#"{"name":"Scale Down", "type":"string", "jsonPath":".spec.scaleDownSchedule"}"#,
    printcolumn = r#"{"name":"Scale Up", "type":"string", "jsonPath":".spec.scaleUpSchedule"}"#,
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".status.currentReplicas"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CronScaleScheduleSpec {
    /// Workload to scale. Required when a scaling schedule is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<TargetRef>,

    /// Cron schedule for scaling down (e.g. "0 0 22 * * *").
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scale_down_schedule: String,

    /// Cron schedule for scaling back up (e.g. "0 0 6 * * *").
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scale_up_schedule: String,

    /// Cron schedule for cleaning up resources.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cleanup_schedule: String,

    /// Cleanup configuration. Required when a cleanup schedule is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_config: Option<CleanupConfig>,

    /// IANA timezone the schedules are evaluated in.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

/// Reference to the workload being scaled.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    /// Name of the workload.
    pub name: String,

    /// Namespace of the workload.
    pub namespace: String,

    /// Kind of the workload (Deployment, StatefulSet).
    pub kind: String,

    /// API version of the workload.
    #[serde(default = "default_target_api_version")]
    pub api_version: String,
}

fn default_target_api_version() -> String {
    "apps/v1".to_string()
}

/// Which resources the cleanup schedule reaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CleanupConfig {
    /// Namespaces to search. Defaults to the schedule's own namespace.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,

    /// Annotation key that marks a resource for cleanup.
    pub annotation_key: String,

    /// Resource kinds to consider (e.g. ["ConfigMap", "Secret"]).
    pub resource_types: Vec<String>,

    /// Only resources carrying all of these labels are considered.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub label_selector: BTreeMap<String, String>,

    /// Log what would be deleted without deleting anything.
    #[serde(default)]
    pub dry_run: bool,

    /// Also reap resources without the annotation once they are old enough.
    #[serde(default)]
    pub cleanup_orphan_resources: bool,

    /// Maximum age of an unannotated resource (e.g. "24h", "7d").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orphan_resource_max_age: Option<String>,
}

/// CronScaleSchedule status. Written only by the operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CronScaleScheduleStatus {
    /// When the workload was last scaled down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scale_down_time: Option<DateTime<Utc>>,

    /// When the workload was last scaled up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scale_up_time: Option<DateTime<Utc>>,

    /// When the last cleanup pass ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_cleanup_time: Option<DateTime<Utc>>,

    /// Last observed replica count of the target workload.
    #[serde(default)]
    pub current_replicas: i32,

    /// Resources deleted (or that would have been, in dry run) by the last cleanup.
    #[serde(default)]
    pub last_cleanup_resource_count: i32,

    /// Human-readable summary of the last pass that changed the status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Generation of the spec the status was computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
