//! Scale actuator.
//!
//! Scale-down records the pre-scale replica count on the workload itself, in
//! [`ORIGINAL_REPLICAS_ANNOTATION`], and scale-up restores it. The annotation
//! is written once and never cleared, so repeated cycles always restore the
//! count from before the first scale-down.

use crate::crd::TargetRef;
use crate::error::{OperatorError, OperatorResult};
use crate::store::WorkloadStore;
use crate::workload::Scalable;
use std::sync::Arc;

/// Annotation on the target workload holding its pre-scale-down replica count.
pub const ORIGINAL_REPLICAS_ANNOTATION: &str = "cronscale.io/original-replicas";

/// Result of a scale call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOutcome {
    /// Replicas were changed.
    Scaled {
        /// Count before the change.
        from: i32,
        /// Count after the change.
        to: i32,
    },
    /// The workload already had the requested count.
    Unchanged {
        /// Current count.
        replicas: i32,
    },
}

impl ScaleOutcome {
    /// Replica count after the call.
    pub fn replicas(&self) -> i32 {
        match self {
            ScaleOutcome::Scaled { to, .. } => *to,
            ScaleOutcome::Unchanged { replicas } => *replicas,
        }
    }
}

/// Scales target workloads through a [`WorkloadStore`].
#[derive(Clone)]
pub struct ScaleActuator {
    store: Arc<dyn WorkloadStore>,
}

impl ScaleActuator {
    /// Create an actuator over the given store.
    pub fn new(store: Arc<dyn WorkloadStore>) -> Self {
        Self { store }
    }

    /// Scale the target to zero, recording its replica count first if needed.
    ///
    /// A workload already at zero still gets its count recorded, so a later
    /// scale-up restores zero instead of failing.
    ///
    /// The annotation write and the replica write are separate updates. If
    /// the second fails the annotation stays, which is harmless: the next
    /// attempt sees it and leaves it alone.
    pub async fn scale_down(&self, target: &TargetRef) -> OperatorResult<ScaleOutcome> {
        let mut workload = self.store.fetch(target).await?;
        let current = workload.replicas();

        if workload.annotation(ORIGINAL_REPLICAS_ANNOTATION).is_none() {
            workload
                .annotations_mut()
                .insert(ORIGINAL_REPLICAS_ANNOTATION.to_string(), current.to_string());
            workload = self.store.replace(target, &workload).await?;
            tracing::info!(
                kind = %target.kind,
                name = %target.name,
                replicas = current,
                "Recorded original replica count"
            );
        }

        if current == 0 {
            tracing::info!(
                kind = %target.kind,
                name = %target.name,
                namespace = %target.namespace,
                "Workload already scaled down, skipping"
            );
            return Ok(ScaleOutcome::Unchanged { replicas: 0 });
        }

        workload.set_replicas(0);
        self.store.replace(target, &workload).await?;

        tracing::info!(
            kind = %target.kind,
            name = %target.name,
            namespace = %target.namespace,
            from = current,
            "Scaled down workload"
        );

        Ok(ScaleOutcome::Scaled {
            from: current,
            to: 0,
        })
    }

    /// Restore the recorded replica count.
    pub async fn scale_up(&self, target: &TargetRef) -> OperatorResult<ScaleOutcome> {
        let mut workload = self.store.fetch(target).await?;

        let raw = workload
            .annotation(ORIGINAL_REPLICAS_ANNOTATION)
            .ok_or_else(|| OperatorError::MissingReplicaMemory {
                kind: target.kind.clone(),
                name: target.name.clone(),
                namespace: target.namespace.clone(),
            })?;

        let original = raw
            .trim()
            .parse::<i32>()
            .ok()
            .filter(|r| *r >= 0)
            .ok_or_else(|| OperatorError::InvalidReplicaMemory {
                kind: target.kind.clone(),
                name: target.name.clone(),
                value: raw.to_string(),
            })?;

        let current = workload.replicas();
        if current == original {
            tracing::debug!(
                kind = %target.kind,
                name = %target.name,
                replicas = current,
                "Workload already at original replica count"
            );
            return Ok(ScaleOutcome::Unchanged { replicas: current });
        }

        workload.set_replicas(original);
        self.store.replace(target, &workload).await?;

        tracing::info!(
            kind = %target.kind,
            name = %target.name,
            namespace = %target.namespace,
            from = current,
            to = original,
            "Scaled up workload"
        );

        Ok(ScaleOutcome::Scaled {
            from: current,
            to: original,
        })
    }

    /// Current desired replica count of the target.
    pub async fn current_replicas(&self, target: &TargetRef) -> OperatorResult<i32> {
        Ok(self.store.fetch(target).await?.replicas())
    }
}
