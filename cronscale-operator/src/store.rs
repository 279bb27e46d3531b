//! Resource-store access.
//!
//! The engine talks to the API server only through these traits so it can be
//! driven by in-memory stores in tests. The kube-backed implementations use
//! plain `Api` calls; updates carry the fetched `resourceVersion`, so a
//! concurrent edit surfaces as [`OperatorError::Conflict`] and is retried on
//! the next pass.

use crate::crd::{CronScaleSchedule, TargetRef};
use crate::error::{OperatorError, OperatorResult};
use crate::workload::{Workload, WorkloadKind};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};

/// Fetch and update scale targets.
#[async_trait]
pub trait WorkloadStore: Send + Sync {
    /// Fetch the workload a target reference points at.
    async fn fetch(&self, target: &TargetRef) -> OperatorResult<Workload>;

    /// Replace the workload, failing on a stale `resourceVersion`.
    ///
    /// Returns the stored object, with its new `resourceVersion`.
    async fn replace(&self, target: &TargetRef, workload: &Workload) -> OperatorResult<Workload>;
}

/// Read schedules and write their status.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// All schedules across namespaces.
    async fn list(&self) -> OperatorResult<Vec<CronScaleSchedule>>;

    /// A single schedule, `None` if it does not exist.
    async fn get(&self, namespace: &str, name: &str) -> OperatorResult<Option<CronScaleSchedule>>;

    /// Merge-patch the status subresource.
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: serde_json::Value,
    ) -> OperatorResult<()>;
}

/// [`WorkloadStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeWorkloadStore {
    client: Client,
}

impl KubeWorkloadStore {
    /// Create a store using the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn target_kind(target: &TargetRef) -> OperatorResult<WorkloadKind> {
    WorkloadKind::from_kind(&target.kind)
        .ok_or_else(|| OperatorError::UnsupportedKind(target.kind.clone()))
}

#[async_trait]
impl WorkloadStore for KubeWorkloadStore {
    async fn fetch(&self, target: &TargetRef) -> OperatorResult<Workload> {
        let kind = target_kind(target)?;
        let map_err =
            |e| OperatorError::from_kube(e, kind.as_str(), &target.name, &target.namespace);

        match kind {
            WorkloadKind::Deployment => {
                let api: Api<Deployment> =
                    Api::namespaced(self.client.clone(), &target.namespace);
                api.get(&target.name)
                    .await
                    .map(Workload::Deployment)
                    .map_err(map_err)
            }
            WorkloadKind::StatefulSet => {
                let api: Api<StatefulSet> =
                    Api::namespaced(self.client.clone(), &target.namespace);
                api.get(&target.name)
                    .await
                    .map(Workload::StatefulSet)
                    .map_err(map_err)
            }
        }
    }

    async fn replace(&self, target: &TargetRef, workload: &Workload) -> OperatorResult<Workload> {
        let kind = workload.kind();
        let map_err =
            |e| OperatorError::from_kube(e, kind.as_str(), &target.name, &target.namespace);
        let params = PostParams::default();

        match workload {
            Workload::Deployment(d) => {
                let api: Api<Deployment> =
                    Api::namespaced(self.client.clone(), &target.namespace);
                api.replace(&target.name, &params, d)
                    .await
                    .map(Workload::Deployment)
                    .map_err(map_err)
            }
            Workload::StatefulSet(s) => {
                let api: Api<StatefulSet> =
                    Api::namespaced(self.client.clone(), &target.namespace);
                api.replace(&target.name, &params, s)
                    .await
                    .map(Workload::StatefulSet)
                    .map_err(map_err)
            }
        }
    }
}

/// [`ScheduleStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeScheduleStore {
    client: Client,
}

impl KubeScheduleStore {
    /// Create a store using the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScheduleStore for KubeScheduleStore {
    async fn list(&self) -> OperatorResult<Vec<CronScaleSchedule>> {
        let api: Api<CronScaleSchedule> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get(&self, namespace: &str, name: &str) -> OperatorResult<Option<CronScaleSchedule>> {
        let api: Api<CronScaleSchedule> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: serde_json::Value,
    ) -> OperatorResult<()> {
        let api: Api<CronScaleSchedule> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "status": status });

        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| OperatorError::from_kube(e, "CronScaleSchedule", name, namespace))?;

        Ok(())
    }
}
