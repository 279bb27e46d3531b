//! CronScaleSchedule controller.
//!
//! One pass: validate the spec, run whichever of scale-down, scale-up and
//! cleanup are due, merge-patch the status fields that changed, and requeue
//! for the nearest future occurrence. Scaling and cleanup succeed or fail
//! independently; the status is written when at least one of them succeeded.

use super::{ControllerContext, ReconcileAction};
use crate::actuator::{ScaleActuator, ScaleOutcome};
use crate::cleanup::CleanupReaper;
use crate::crd::{CronScaleSchedule, CronScaleScheduleSpec, CronScaleScheduleStatus, TargetRef};
use crate::error::{OperatorError, OperatorResult};
use crate::schedule::{is_due, next_occurrence, parse_time_zone, plan_requeue, plan_scaling, ScalingPlan};
use crate::validation::validate_spec;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use kube::ResourceExt;
use serde::Serialize;
use std::sync::Arc;

/// Fields of the status this pass changed.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    last_scale_down_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_scale_up_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_cleanup_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_cleanup_resource_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    observed_generation: Option<i64>,
}

/// Accumulated results of one pass.
#[derive(Debug, Default)]
struct Pass {
    patch: StatusPatch,
    succeeded: usize,
    transient_failure: bool,
    notes: Vec<String>,
}

impl Pass {
    fn record_failure(&mut self, step: &str, error: &OperatorError) {
        self.transient_failure |= error.is_transient();
        self.notes.push(format!("{} failed: {}", step, error));
    }
}

/// Timestamps never move backwards.
fn advance(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    previous.map_or(now, |p| p.max(now))
}

/// Controller for CronScaleSchedule resources.
#[derive(Clone)]
pub struct ScheduleController {
    ctx: Arc<ControllerContext>,
    actuator: ScaleActuator,
    reaper: CleanupReaper,
}

impl ScheduleController {
    /// Create a new schedule controller.
    pub fn new(ctx: Arc<ControllerContext>) -> Self {
        let actuator = ScaleActuator::new(ctx.workloads.clone());
        let reaper = CleanupReaper::new(ctx.kinds.clone());
        Self {
            ctx,
            actuator,
            reaper,
        }
    }

    /// Reconcile a CronScaleSchedule at the current time.
    pub async fn reconcile(&self, schedule: Arc<CronScaleSchedule>) -> OperatorResult<ReconcileAction> {
        self.reconcile_at(&schedule, Utc::now()).await
    }

    /// Reconcile a CronScaleSchedule as of `now`.
    pub async fn reconcile_at(
        &self,
        schedule: &CronScaleSchedule,
        now: DateTime<Utc>,
    ) -> OperatorResult<ReconcileAction> {
        let name = schedule.name_any();
        let namespace = schedule.namespace().ok_or_else(|| {
            OperatorError::InvalidConfig("CronScaleSchedule must be namespaced".into())
        })?;
        let spec = &schedule.spec;

        tracing::info!(name = %name, namespace = %namespace, "Reconciling CronScaleSchedule");

        // A broken spec has no meaningful next occurrence; retry on a fixed delay.
        if let Err(e) = validate_spec(spec) {
            tracing::error!(
                name = %name,
                namespace = %namespace,
                error = %e,
                "Invalid CronScaleSchedule spec"
            );
            return Ok(ReconcileAction::Requeue(self.ctx.settings.invalid_spec_retry));
        }

        let tz = parse_time_zone(&spec.time_zone)
            .map_err(|e| OperatorError::InvalidConfig(e.to_string()))?;
        let status = schedule.status.clone().unwrap_or_default();
        let mut pass = Pass::default();

        self.run_scaling(spec, &status, now, tz, &mut pass).await;
        self.run_cleanup(spec, &status, &namespace, now, tz, &mut pass).await;

        if pass.succeeded > 0 {
            pass.patch.message = Some(pass.notes.join("; "));
            pass.patch.observed_generation = schedule.metadata.generation;
            let patch = serde_json::to_value(&pass.patch)?;
            self.ctx
                .schedules
                .patch_status(&namespace, &name, patch)
                .await?;
        } else if !pass.notes.is_empty() {
            tracing::warn!(
                name = %name,
                namespace = %namespace,
                summary = %pass.notes.join("; "),
                "No action succeeded, status left unchanged"
            );
        }

        let next = [
            next_occurrence(&spec.scale_down_schedule, now, tz),
            next_occurrence(&spec.scale_up_schedule, now, tz),
            next_occurrence(&spec.cleanup_schedule, now, tz),
        ];
        let error_retry = self.ctx.settings.error_retry;
        let action = match (plan_requeue(now, &next), pass.transient_failure) {
            (Some(after), true) => ReconcileAction::Requeue(after.min(error_retry)),
            (None, true) => ReconcileAction::Requeue(error_retry),
            (Some(after), false) => ReconcileAction::Requeue(after),
            (None, false) => ReconcileAction::Done,
        };

        tracing::info!(
            name = %name,
            namespace = %namespace,
            requeue_secs = ?action.requeue_after().map(|d| d.as_secs()),
            "Reconciliation pass complete"
        );

        Ok(action)
    }

    async fn run_scaling(
        &self,
        spec: &CronScaleScheduleSpec,
        status: &CronScaleScheduleStatus,
        now: DateTime<Utc>,
        tz: Tz,
        pass: &mut Pass,
    ) {
        let Some(target) = spec.target_ref.as_ref() else {
            return;
        };

        let plan = plan_scaling(
            &spec.scale_down_schedule,
            &spec.scale_up_schedule,
            now,
            status.last_scale_down_time,
            status.last_scale_up_time,
            tz,
        );

        match plan {
            ScalingPlan::Idle => {}
            ScalingPlan::ScaleDown { supersedes_up } => {
                if supersedes_up {
                    tracing::info!(
                        workload = %target.name,
                        "Scale-up also due, superseded by the later scale-down occurrence"
                    );
                }
                match self.actuator.scale_down(target).await {
                    Ok(outcome) => {
                        pass.patch.last_scale_down_time = Some(advance(status.last_scale_down_time, now));
                        if supersedes_up {
                            pass.patch.last_scale_up_time = Some(advance(status.last_scale_up_time, now));
                        }
                        let replicas = self.observed_replicas(target, outcome).await;
                        self.record_scale(pass, "scaled down", outcome, replicas);
                    }
                    Err(e) => {
                        tracing::error!(workload = %target.name, error = %e, "Scale-down failed");
                        pass.record_failure("scale-down", &e);
                    }
                }
            }
            ScalingPlan::ScaleUp { supersedes_down } => {
                if supersedes_down {
                    tracing::info!(
                        workload = %target.name,
                        "Scale-down also due, superseded by the later scale-up occurrence"
                    );
                }
                match self.actuator.scale_up(target).await {
                    Ok(outcome) => {
                        pass.patch.last_scale_up_time = Some(advance(status.last_scale_up_time, now));
                        if supersedes_down {
                            pass.patch.last_scale_down_time =
                                Some(advance(status.last_scale_down_time, now));
                        }
                        let replicas = self.observed_replicas(target, outcome).await;
                        self.record_scale(pass, "scaled up", outcome, replicas);
                    }
                    Err(e) => {
                        tracing::error!(workload = %target.name, error = %e, "Scale-up failed");
                        pass.record_failure("scale-up", &e);
                    }
                }
            }
        }
    }

    /// Re-read the target after a scale; falls back to the outcome's count.
    async fn observed_replicas(&self, target: &TargetRef, outcome: ScaleOutcome) -> i32 {
        match self.actuator.current_replicas(target).await {
            Ok(replicas) => replicas,
            Err(e) => {
                tracing::warn!(workload = %target.name, error = %e, "Replica probe failed");
                outcome.replicas()
            }
        }
    }

    fn record_scale(&self, pass: &mut Pass, verb: &str, outcome: ScaleOutcome, replicas: i32) {
        pass.succeeded += 1;
        pass.patch.current_replicas = Some(replicas);
        pass.notes.push(match outcome {
            ScaleOutcome::Scaled { from, to } => format!("{} from {} to {} replicas", verb, from, to),
            ScaleOutcome::Unchanged { replicas } => {
                format!("{}: already at {} replicas", verb, replicas)
            }
        });
    }

    async fn run_cleanup(
        &self,
        spec: &CronScaleScheduleSpec,
        status: &CronScaleScheduleStatus,
        namespace: &str,
        now: DateTime<Utc>,
        tz: Tz,
        pass: &mut Pass,
    ) {
        if !is_due(&spec.cleanup_schedule, now, status.last_cleanup_time, tz) {
            return;
        }
        let Some(config) = spec.cleanup_config.as_ref() else {
            return;
        };

        match self.reaper.cleanup(config, namespace, now).await {
            Ok(report) => {
                pass.succeeded += 1;
                pass.patch.last_cleanup_time = Some(advance(status.last_cleanup_time, now));
                pass.patch.last_cleanup_resource_count = Some(report.count);
                let verb = if report.dry_run { "would clean up" } else { "cleaned up" };
                let mut note = format!("{} {} resources", verb, report.count);
                if !report.failures.is_empty() {
                    note.push_str(&format!(" ({} failures)", report.failures.len()));
                }
                pass.notes.push(note);
            }
            Err(e) => {
                tracing::error!(error = %e, "Cleanup failed");
                pass.record_failure("cleanup", &e);
            }
        }
    }
}

/// Handle errors during reconciliation.
pub fn error_policy(
    schedule: Arc<CronScaleSchedule>,
    error: &OperatorError,
    ctx: Arc<ControllerContext>,
) -> kube::runtime::controller::Action {
    tracing::error!(
        name = %schedule.name_any(),
        error = %error,
        "Reconciliation error"
    );
    kube::runtime::controller::Action::requeue(ctx.settings.error_retry)
}
