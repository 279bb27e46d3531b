//! Kubernetes controller for CronScaleSchedule resources.
//!
//! [`ScheduleController`] runs one reconciliation pass per invocation:
//! validate, scale, clean up, persist status, then report when it needs to
//! run again.
//!
//! # Usage with kube-runtime
//!
//! ```ignore
//! use cronscale_operator::controller::{error_policy, ControllerContext, ScheduleController};
//!
//! Controller::new(schedules, watcher_config)
//!     .shutdown_on_signal()
//!     .run(|schedule, ctx| async move {
//!         let controller = ScheduleController::new(ctx.clone());
//!         controller.reconcile(schedule).await.map(|a| a.into_action())
//!     }, error_policy, context)
//!     .for_each(|_| futures::future::ready(()))
//!     .await;
//! ```

mod schedule;

pub use schedule::{error_policy, ScheduleController};

use crate::cleanup::KindRegistry;
use crate::config::EngineSettings;
use crate::store::{KubeScheduleStore, KubeWorkloadStore, ScheduleStore, WorkloadStore};
use std::sync::Arc;
use std::time::Duration;

/// Shared context for the controller.
pub struct ControllerContext {
    /// Target workload access.
    pub workloads: Arc<dyn WorkloadStore>,
    /// Schedule access.
    pub schedules: Arc<dyn ScheduleStore>,
    /// Cleanup kind listers.
    pub kinds: Arc<KindRegistry>,
    /// Retry timing.
    pub settings: EngineSettings,
}

impl ControllerContext {
    /// Create a context backed by the Kubernetes API.
    pub fn new(client: kube::Client, settings: EngineSettings) -> Self {
        Self {
            workloads: Arc::new(KubeWorkloadStore::new(client.clone())),
            schedules: Arc::new(KubeScheduleStore::new(client.clone())),
            kinds: Arc::new(KindRegistry::kube(client)),
            settings,
        }
    }

    /// Create a context over explicit stores.
    pub fn with_stores(
        workloads: Arc<dyn WorkloadStore>,
        schedules: Arc<dyn ScheduleStore>,
        kinds: Arc<KindRegistry>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            workloads,
            schedules,
            kinds,
            settings,
        }
    }
}

/// Result type for reconciliation actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Requeue after the specified duration.
    Requeue(Duration),
    /// Don't requeue until the object changes.
    Done,
}

impl ReconcileAction {
    /// Convert into the kube-runtime action.
    pub fn into_action(self) -> kube::runtime::controller::Action {
        match self {
            ReconcileAction::Requeue(after) => kube::runtime::controller::Action::requeue(after),
            ReconcileAction::Done => kube::runtime::controller::Action::await_change(),
        }
    }

    /// Delay before the next pass, if any.
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            ReconcileAction::Requeue(after) => Some(*after),
            ReconcileAction::Done => None,
        }
    }
}
