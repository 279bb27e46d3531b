//! In-memory stores for engine tests.

use crate::cleanup::{Candidate, CandidateLister};
use crate::crd::{CronScaleSchedule, TargetRef};
use crate::error::{OperatorError, OperatorResult};
use crate::store::{ScheduleStore, WorkloadStore};
use crate::workload::Workload;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec};
use kube::api::ObjectMeta;
use std::collections::{HashMap, HashSet};
use parking_lot::Mutex;

fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        resource_version: Some("1".to_string()),
        ..Default::default()
    }
}

/// A Deployment with the given replica count.
pub(crate) fn deployment(namespace: &str, name: &str, replicas: i32) -> Workload {
    Workload::Deployment(Deployment {
        metadata: meta(namespace, name),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// A StatefulSet with the given replica count.
pub(crate) fn statefulset(namespace: &str, name: &str, replicas: i32) -> Workload {
    Workload::StatefulSet(StatefulSet {
        metadata: meta(namespace, name),
        spec: Some(StatefulSetSpec {
            replicas: Some(replicas),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Target reference for a fixture workload.
pub(crate) fn target(kind: &str, namespace: &str, name: &str) -> TargetRef {
    TargetRef {
        name: name.to_string(),
        namespace: namespace.to_string(),
        kind: kind.to_string(),
        api_version: "apps/v1".to_string(),
    }
}

fn workload_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

fn resource_version(workload: &Workload) -> Option<String> {
    match workload {
        Workload::Deployment(d) => d.metadata.resource_version.clone(),
        Workload::StatefulSet(s) => s.metadata.resource_version.clone(),
    }
}

fn set_resource_version(workload: &mut Workload, version: String) {
    match workload {
        Workload::Deployment(d) => d.metadata.resource_version = Some(version),
        Workload::StatefulSet(s) => s.metadata.resource_version = Some(version),
    }
}

/// [`WorkloadStore`] over a map, with optimistic concurrency and failure injection.
#[derive(Default)]
pub(crate) struct MemoryWorkloadStore {
    objects: Mutex<HashMap<String, Workload>>,
    replaces: Mutex<Vec<Workload>>,
    fail_replace_after: Mutex<Option<usize>>,
    fail_fetch: Mutex<bool>,
}

impl MemoryWorkloadStore {
    pub(crate) fn with(workloads: impl IntoIterator<Item = Workload>) -> Self {
        let store = Self::default();
        {
            let mut objects = store.objects.lock();
            for workload in workloads {
                let namespace = match &workload {
                    Workload::Deployment(d) => d.metadata.namespace.clone(),
                    Workload::StatefulSet(s) => s.metadata.namespace.clone(),
                }
                .unwrap_or_default();
                objects.insert(workload_key(&namespace, workload.name()), workload);
            }
        }
        store
    }

    /// Current stored object.
    pub(crate) fn get(&self, namespace: &str, name: &str) -> Option<Workload> {
        self.objects
            .lock()
            .get(&workload_key(namespace, name))
            .cloned()
    }

    /// Every object passed to a successful `replace`, in order.
    pub(crate) fn replaces(&self) -> Vec<Workload> {
        self.replaces.lock().clone()
    }

    /// Let the next `n` replaces succeed, then fail every one after.
    pub(crate) fn fail_replace_after(&self, n: usize) {
        *self.fail_replace_after.lock() = Some(n);
    }

    /// Make every fetch fail with an API error.
    pub(crate) fn fail_fetch(&self) {
        *self.fail_fetch.lock() = true;
    }

    /// Edit the stored object out of band, bumping its resourceVersion.
    pub(crate) fn edit(&self, namespace: &str, name: &str, f: impl FnOnce(&mut Workload)) {
        let mut objects = self.objects.lock();
        if let Some(workload) = objects.get_mut(&workload_key(namespace, name)) {
            f(workload);
            let next = resource_version(workload)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0)
                + 1;
            set_resource_version(workload, next.to_string());
        }
    }
}

fn api_error(code: u16, reason: &str) -> OperatorError {
    OperatorError::KubeError(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected {}", reason),
        reason: reason.to_string(),
        code,
    }))
}

#[async_trait]
impl WorkloadStore for MemoryWorkloadStore {
    async fn fetch(&self, target: &TargetRef) -> OperatorResult<Workload> {
        if *self.fail_fetch.lock() {
            return Err(api_error(500, "InternalError"));
        }
        self.get(&target.namespace, &target.name)
            .ok_or_else(|| OperatorError::NotFound {
                kind: target.kind.clone(),
                name: target.name.clone(),
                namespace: target.namespace.clone(),
            })
    }

    async fn replace(&self, target: &TargetRef, workload: &Workload) -> OperatorResult<Workload> {
        {
            let mut budget = self.fail_replace_after.lock();
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(api_error(500, "InternalError"));
                }
                *remaining -= 1;
            }
        }

        let mut objects = self.objects.lock();
        let key = workload_key(&target.namespace, &target.name);
        let stored = objects.get(&key).ok_or_else(|| OperatorError::NotFound {
            kind: target.kind.clone(),
            name: target.name.clone(),
            namespace: target.namespace.clone(),
        })?;

        if resource_version(stored) != resource_version(workload) {
            return Err(OperatorError::Conflict {
                kind: target.kind.clone(),
                name: target.name.clone(),
                cause: "the object has been modified".to_string(),
            });
        }

        let next = resource_version(stored)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        let mut updated = workload.clone();
        set_resource_version(&mut updated, next.to_string());
        objects.insert(key, updated.clone());
        self.replaces.lock().push(updated.clone());
        Ok(updated)
    }
}

/// [`ScheduleStore`] that records status patches.
#[derive(Default)]
pub(crate) struct MemoryScheduleStore {
    schedules: Mutex<Vec<CronScaleSchedule>>,
    patches: Mutex<Vec<(String, String, serde_json::Value)>>,
    fail_patch: Mutex<bool>,
}

impl MemoryScheduleStore {
    pub(crate) fn with(schedules: impl IntoIterator<Item = CronScaleSchedule>) -> Self {
        Self {
            schedules: Mutex::new(schedules.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Recorded `(namespace, name, status)` patches.
    pub(crate) fn patches(&self) -> Vec<(String, String, serde_json::Value)> {
        self.patches.lock().clone()
    }

    pub(crate) fn fail_patch(&self) {
        *self.fail_patch.lock() = true;
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn list(&self) -> OperatorResult<Vec<CronScaleSchedule>> {
        Ok(self.schedules.lock().clone())
    }

    async fn get(&self, namespace: &str, name: &str) -> OperatorResult<Option<CronScaleSchedule>> {
        Ok(self
            .schedules
            .lock()
            .iter()
            .find(|s| {
                s.metadata.namespace.as_deref() == Some(namespace)
                    && s.metadata.name.as_deref() == Some(name)
            })
            .cloned())
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: serde_json::Value,
    ) -> OperatorResult<()> {
        if *self.fail_patch.lock() {
            return Err(api_error(500, "InternalError"));
        }
        self.patches
            .lock()
            .push((namespace.to_string(), name.to_string(), status));
        Ok(())
    }
}

/// [`CandidateLister`] over a fixed population.
pub(crate) struct MemoryLister {
    kind: String,
    cluster_scoped: bool,
    items: Mutex<Vec<Candidate>>,
    deleted: Mutex<Vec<String>>,
    list_calls: Mutex<Vec<(Option<String>, Option<String>)>>,
    failing_namespaces: HashSet<String>,
    failing_deletes: HashSet<String>,
}

impl MemoryLister {
    pub(crate) fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            cluster_scoped: false,
            items: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            list_calls: Mutex::new(Vec::new()),
            failing_namespaces: HashSet::new(),
            failing_deletes: HashSet::new(),
        }
    }

    pub(crate) fn cluster(kind: &str) -> Self {
        Self {
            cluster_scoped: true,
            ..Self::new(kind)
        }
    }

    pub(crate) fn with(self, candidate: Candidate) -> Self {
        self.items.lock().push(candidate);
        self
    }

    pub(crate) fn fail_list_in(mut self, namespace: &str) -> Self {
        self.failing_namespaces.insert(namespace.to_string());
        self
    }

    pub(crate) fn fail_delete_of(mut self, name: &str) -> Self {
        self.failing_deletes.insert(name.to_string());
        self
    }

    /// Names deleted so far.
    pub(crate) fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }

    /// Resources still present.
    pub(crate) fn remaining(&self) -> usize {
        self.items.lock().len()
    }

    /// `(namespace, selector)` of each list call.
    pub(crate) fn list_calls(&self) -> Vec<(Option<String>, Option<String>)> {
        self.list_calls.lock().clone()
    }
}

#[async_trait]
impl CandidateLister for MemoryLister {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn cluster_scoped(&self) -> bool {
        self.cluster_scoped
    }

    async fn list(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> OperatorResult<Vec<Candidate>> {
        self.list_calls
            .lock()
            .push((namespace.map(String::from), label_selector.map(String::from)));

        if let Some(ns) = namespace {
            if self.failing_namespaces.contains(ns) {
                return Err(api_error(403, "Forbidden"));
            }
        }

        Ok(self
            .items
            .lock()
            .iter()
            .filter(|c| self.cluster_scoped || namespace.is_none() || c.namespace.as_deref() == namespace)
            .cloned()
            .collect())
    }

    async fn delete(&self, candidate: &Candidate) -> OperatorResult<()> {
        if self.failing_deletes.contains(&candidate.name) {
            return Err(api_error(500, "InternalError"));
        }
        self.items
            .lock()
            .retain(|c| !(c.name == candidate.name && c.namespace == candidate.namespace));
        self.deleted.lock().push(candidate.name.clone());
        Ok(())
    }
}
