//! CronScale Kubernetes Operator
//!
//! Scales Deployments and StatefulSets to zero and back on cron schedules,
//! and reaps resources marked with an expiry annotation (or left orphaned
//! past a maximum age).
//!
//! # Custom Resource Definitions
//!
//! - **CronScaleSchedule**: scale-down, scale-up and cleanup schedules for one target
//!
//! # Example
//!
//! ```yaml
//! apiVersion: cronscale.io/v1
//! kind: CronScaleSchedule
//! metadata:
//!   name: web-nightly
//! spec:
//!   targetRef:
//!     name: web
//!     namespace: apps
//!     kind: Deployment
//!   scaleDownSchedule: "0 0 22 * * *"
//!   scaleUpSchedule: "0 0 6 * * *"
//!   cleanupSchedule: "0 0 * * * *"
//!   cleanupConfig:
//!     annotationKey: cronscale.io/cleanup-after
//!     resourceTypes: [ConfigMap, Secret]
//!     cleanupOrphanResources: true
//!     orphanResourceMaxAge: 7d
//!   timeZone: Europe/Berlin
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod actuator;
pub mod cleanup;
pub mod config;
pub mod controller;
pub mod crd;
pub mod dashboard;
pub mod error;
pub mod schedule;
pub mod store;
pub mod validation;
pub mod workload;

#[cfg(test)]
pub(crate) mod testing;

pub use crd::{CronScaleSchedule, CronScaleScheduleSpec, CronScaleScheduleStatus};
pub use error::{OperatorError, OperatorResult};
