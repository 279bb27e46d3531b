//! Read-only dashboard API.
//!
//! Serves a JSON view of every CronScaleSchedule with a live probe of its
//! target workload, plus a single-page HTML dashboard over that view:
//!
//! - `GET /`
//! - `GET /api/v1/schedules`
//! - `GET /api/v1/schedules/{namespace}/{name}`
//! - `GET /healthz`
//!
//! Nothing here writes to the cluster.

use crate::crd::{CronScaleSchedule, TargetRef};
use crate::error::{OperatorError, OperatorResult};
use crate::store::{ScheduleStore, WorkloadStore};
use crate::workload::TargetStatus;
use chrono::{DateTime, Utc};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Response, StatusCode};
use kube::ResourceExt;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

const SCHEDULES_PATH: &str = "/api/v1/schedules";

/// Dashboard page; polls [`SCHEDULES_PATH`] from the browser.
const DASHBOARD_PAGE: &str = include_str!("../assets/dashboard.html");

/// JSON projection of a schedule.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    /// Schedule name.
    pub name: String,
    /// Schedule namespace.
    pub namespace: String,
    /// Scale target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<TargetRef>,
    /// Scale-down cron expression.
    pub scale_down_schedule: String,
    /// Scale-up cron expression.
    pub scale_up_schedule: String,
    /// Cleanup cron expression.
    pub cleanup_schedule: String,
    /// Timezone the schedules run in.
    pub time_zone: String,
    /// Last scale-down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scale_down_time: Option<DateTime<Utc>>,
    /// Last scale-up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scale_up_time: Option<DateTime<Utc>>,
    /// Last cleanup pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cleanup_time: Option<DateTime<Utc>>,
    /// Replica count recorded by the last pass.
    pub current_replicas: i32,
    /// Resources handled by the last cleanup.
    pub last_cleanup_resource_count: i32,
    /// Summary of the last pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Live target probe; absent without a target or when the probe fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_status: Option<TargetStatus>,
}

/// Dashboard request handler.
pub struct Dashboard {
    schedules: Arc<dyn ScheduleStore>,
    workloads: Arc<dyn WorkloadStore>,
}

impl Dashboard {
    /// Create a dashboard over the given stores.
    pub fn new(schedules: Arc<dyn ScheduleStore>, workloads: Arc<dyn WorkloadStore>) -> Self {
        Self {
            schedules,
            workloads,
        }
    }

    /// Build the view of one schedule, probing its target.
    pub async fn view(&self, schedule: &CronScaleSchedule) -> ScheduleView {
        let spec = &schedule.spec;
        let status = schedule.status.clone().unwrap_or_default();

        let target_status = match spec.target_ref.as_ref() {
            Some(target) => match self.workloads.fetch(target).await {
                Ok(workload) => Some(workload.target_status()),
                Err(e) => {
                    tracing::debug!(workload = %target.name, error = %e, "Target probe failed");
                    None
                }
            },
            None => None,
        };

        ScheduleView {
            name: schedule.name_any(),
            namespace: schedule.namespace().unwrap_or_default(),
            target_ref: spec.target_ref.clone(),
            scale_down_schedule: spec.scale_down_schedule.clone(),
            scale_up_schedule: spec.scale_up_schedule.clone(),
            cleanup_schedule: spec.cleanup_schedule.clone(),
            time_zone: spec.time_zone.clone(),
            last_scale_down_time: status.last_scale_down_time,
            last_scale_up_time: status.last_scale_up_time,
            last_cleanup_time: status.last_cleanup_time,
            current_replicas: status.current_replicas,
            last_cleanup_resource_count: status.last_cleanup_resource_count,
            message: status.message,
            target_status,
        }
    }

    /// Answer a request by method and path.
    pub async fn route(&self, method: &Method, path: &str) -> Response<Full<Bytes>> {
        if method != Method::GET {
            return build_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        }

        let path = path.trim_end_matches('/');
        if path.is_empty() {
            return html_response(DASHBOARD_PAGE);
        }
        if path == "/healthz" {
            return build_response(StatusCode::OK, "OK");
        }
        if path == SCHEDULES_PATH {
            return self.list().await;
        }

        let parts: Option<Vec<&str>> = path
            .strip_prefix(SCHEDULES_PATH)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|rest| rest.split('/').collect());

        match parts.as_deref() {
            Some([namespace, name]) if !namespace.is_empty() && !name.is_empty() => {
                self.get(namespace, name).await
            }
            _ => build_response(StatusCode::NOT_FOUND, "Not Found"),
        }
    }

    async fn list(&self) -> Response<Full<Bytes>> {
        let schedules = match self.schedules.list().await {
            Ok(schedules) => schedules,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list schedules");
                return build_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list schedules");
            }
        };

        let mut views = Vec::with_capacity(schedules.len());
        for schedule in &schedules {
            views.push(self.view(schedule).await);
        }
        json_response(&views)
    }

    async fn get(&self, namespace: &str, name: &str) -> Response<Full<Bytes>> {
        match self.schedules.get(namespace, name).await {
            Ok(Some(schedule)) => json_response(&self.view(&schedule).await),
            Ok(None) => build_response(StatusCode::NOT_FOUND, "Schedule not found"),
            Err(e) => {
                tracing::error!(namespace = %namespace, name = %name, error = %e, "Failed to get schedule");
                build_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get schedule")
            }
        }
    }

    /// Serve HTTP/1 on `addr` until the task is dropped.
    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> OperatorResult<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| OperatorError::IoError(format!("failed to bind {}: {}", addr, e)))?;

        tracing::info!(addr = %addr, "Dashboard listening");

        loop {
            let (stream, _peer_addr) = listener
                .accept()
                .await
                .map_err(|e| OperatorError::IoError(e.to_string()))?;
            let dashboard = self.clone();

            tokio::spawn(async move {
                let io = hyper_util::rt::TokioIo::new(stream);
                let service = hyper::service::service_fn(move |req: Request<hyper::body::Incoming>| {
                    let dashboard = dashboard.clone();
                    let method = req.method().clone();
                    let path = req.uri().path().to_owned();
                    async move { Ok::<_, Infallible>(dashboard.route(&method, &path).await) }
                });

                if let Err(e) = hyper::server::conn::http1::Builder::new()
                    .serve_connection(io, service)
                    .await
                {
                    tracing::warn!(error = %e, "Dashboard connection error");
                }
            });
        }
    }
}

fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build response");
            Response::new(Full::new(Bytes::from("Internal Error")))
        })
}

fn html_response(page: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Full::new(Bytes::from_static(page.as_bytes())))
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build response");
            Response::new(Full::new(Bytes::from("Internal Error")))
        })
}

fn json_response<T: Serialize>(value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to build response");
                Response::new(Full::new(Bytes::from("Internal Error")))
            }),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response");
            build_response(StatusCode::INTERNAL_SERVER_ERROR, "Serialization error")
        }
    }
}
