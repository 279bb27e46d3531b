//! Custom Resource Definitions for the cronscale operator.
//!
//! - [`CronScaleSchedule`]: scale-down/scale-up/cleanup schedules for a workload

mod schedule;

pub use schedule::{
    CleanupConfig, CronScaleSchedule, CronScaleScheduleSpec, CronScaleScheduleStatus, TargetRef,
};
