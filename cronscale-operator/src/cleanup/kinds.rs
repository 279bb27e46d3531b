//! Cleanup candidate kinds.
//!
//! Each supported kind maps to a typed [`CandidateLister`]. The reaper only
//! sees the [`KindRegistry`]; adding a kind means adding a row to the table.

use crate::error::{OperatorError, OperatorResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use kube::api::{DeleteParams, ListParams, ObjectMeta, Preconditions};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

/// Kind names accepted in `cleanupConfig.resourceTypes`.
pub const SUPPORTED_CLEANUP_KINDS: [&str; 9] = [
    "Deployment",
    "StatefulSet",
    "Service",
    "ConfigMap",
    "Secret",
    "Role",
    "RoleBinding",
    "ClusterRole",
    "ClusterRoleBinding",
];

/// The metadata the reaper needs from a listed resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    /// Kind name.
    pub kind: String,
    /// Object name.
    pub name: String,
    /// Namespace; `None` for cluster-scoped kinds.
    pub namespace: Option<String>,
    /// Object UID, used as a delete precondition.
    pub uid: Option<String>,
    /// Object annotations.
    pub annotations: BTreeMap<String, String>,
    /// Creation time.
    pub created: Option<DateTime<Utc>>,
}

impl Candidate {
    /// Build a candidate from object metadata.
    pub fn from_meta(kind: &str, meta: &ObjectMeta) -> Self {
        Self {
            kind: kind.to_string(),
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone(),
            uid: meta.uid.clone(),
            annotations: meta.annotations.clone().unwrap_or_default(),
            created: meta.creation_timestamp.as_ref().map(|t| t.0),
        }
    }
}

/// List and delete resources of one kind.
#[async_trait]
pub trait CandidateLister: Send + Sync {
    /// Kind name this lister handles.
    fn kind(&self) -> &str;

    /// Whether the kind lives outside namespaces.
    fn cluster_scoped(&self) -> bool;

    /// List resources, in `namespace` unless the kind is cluster-scoped.
    async fn list(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> OperatorResult<Vec<Candidate>>;

    /// Delete a previously listed resource.
    async fn delete(&self, candidate: &Candidate) -> OperatorResult<()>;
}

/// [`CandidateLister`] for a namespaced `k8s_openapi` type.
pub struct KubeLister<K> {
    client: Client,
    kind: String,
    _resource: PhantomData<fn() -> K>,
}

impl<K> KubeLister<K>
where
    K: Resource<DynamicType = ()>,
{
    fn new(client: Client) -> Self {
        Self {
            client,
            kind: K::kind(&()).to_string(),
            _resource: PhantomData,
        }
    }

    fn api(&self, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

type ListerConstructor = fn(Client) -> Arc<dyn CandidateLister>;

fn namespaced<K>(client: Client) -> Arc<dyn CandidateLister>
where
    K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + Debug
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    Arc::new(KubeLister::<K>::new(client))
}

fn cluster<K>(client: Client) -> Arc<dyn CandidateLister>
where
    K: Resource<DynamicType = (), Scope = k8s_openapi::ClusterResourceScope>
        + Clone
        + Debug
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    Arc::new(ClusterLister(KubeLister::<K>::new(client)))
}

/// Constructors for every supported kind, keyed by kind name.
static KUBE_LISTERS: [(&str, ListerConstructor); 9] = [
    ("Deployment", namespaced::<Deployment>),
    ("StatefulSet", namespaced::<StatefulSet>),
    ("Service", namespaced::<Service>),
    ("ConfigMap", namespaced::<ConfigMap>),
    ("Secret", namespaced::<Secret>),
    ("Role", namespaced::<Role>),
    ("RoleBinding", namespaced::<RoleBinding>),
    ("ClusterRole", cluster::<ClusterRole>),
    ("ClusterRoleBinding", cluster::<ClusterRoleBinding>),
];

fn list_params(label_selector: Option<&str>) -> ListParams {
    match label_selector {
        Some(selector) => ListParams::default().labels(selector),
        None => ListParams::default(),
    }
}

fn delete_params(candidate: &Candidate) -> DeleteParams {
    DeleteParams {
        preconditions: Some(Preconditions {
            uid: candidate.uid.clone(),
            resource_version: None,
        }),
        ..Default::default()
    }
}

#[async_trait]
impl<K> CandidateLister for KubeLister<K>
where
    K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + Debug
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    fn cluster_scoped(&self) -> bool {
        false
    }

    async fn list(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> OperatorResult<Vec<Candidate>> {
        let list = self
            .api(namespace)
            .list(&list_params(label_selector))
            .await?;
        Ok(list
            .items
            .iter()
            .map(|item| Candidate::from_meta(&self.kind, item.meta()))
            .collect())
    }

    async fn delete(&self, candidate: &Candidate) -> OperatorResult<()> {
        let namespace = candidate.namespace.as_deref().unwrap_or_default();
        self.api(Some(namespace))
            .delete(&candidate.name, &delete_params(candidate))
            .await
            .map_err(|e| OperatorError::from_kube(e, &self.kind, &candidate.name, namespace))?;
        Ok(())
    }
}

/// Cluster-scoped variant; `Api::all` is the only way to reach these kinds.
struct ClusterLister<K>(KubeLister<K>);

#[async_trait]
impl<K> CandidateLister for ClusterLister<K>
where
    K: Resource<DynamicType = (), Scope = k8s_openapi::ClusterResourceScope>
        + Clone
        + Debug
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    fn kind(&self) -> &str {
        &self.0.kind
    }

    fn cluster_scoped(&self) -> bool {
        true
    }

    async fn list(
        &self,
        _namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> OperatorResult<Vec<Candidate>> {
        let api: Api<K> = Api::all(self.0.client.clone());
        let list = api.list(&list_params(label_selector)).await?;
        Ok(list
            .items
            .iter()
            .map(|item| Candidate::from_meta(&self.0.kind, item.meta()))
            .collect())
    }

    async fn delete(&self, candidate: &Candidate) -> OperatorResult<()> {
        let api: Api<K> = Api::all(self.0.client.clone());
        api.delete(&candidate.name, &delete_params(candidate))
            .await
            .map_err(|e| OperatorError::from_kube(e, &self.0.kind, &candidate.name, ""))?;
        Ok(())
    }
}

/// Lookup from kind name to lister, injected into the reaper.
#[derive(Clone, Default)]
pub struct KindRegistry {
    listers: HashMap<String, Arc<dyn CandidateLister>>,
}

impl KindRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a Kubernetes-backed lister for every supported kind.
    pub fn kube(client: Client) -> Self {
        KUBE_LISTERS
            .iter()
            .fold(Self::new(), |registry, (_, construct)| {
                registry.register(construct(client.clone()))
            })
    }

    /// Add (or replace) the lister for its kind.
    pub fn register(mut self, lister: Arc<dyn CandidateLister>) -> Self {
        self.listers.insert(lister.kind().to_string(), lister);
        self
    }

    /// Lister for a kind name.
    pub fn get(&self, kind: &str) -> Option<&Arc<dyn CandidateLister>> {
        self.listers.get(kind)
    }
}
