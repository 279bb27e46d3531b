//! CronScale Kubernetes Operator binary.
//!
//! Runs the CronScaleSchedule controller and, unless disabled, the read-only
//! dashboard API.

use clap::Parser;
use cronscale_operator::config::OperatorConfig;
use cronscale_operator::controller::{
    error_policy, ControllerContext, ReconcileAction, ScheduleController,
};
use cronscale_operator::crd::CronScaleSchedule;
use cronscale_operator::dashboard::Dashboard;
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OperatorConfig::parse();

    // CRD generation mode
    if config.generate_crds {
        generate_crds()?;
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cronscale_operator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    tracing::info!("Starting CronScale Kubernetes Operator");

    // Every API call is bounded by the same timeout.
    let mut kube_config = kube::Config::infer().await?;
    kube_config.connect_timeout = Some(config.api_timeout);
    kube_config.read_timeout = Some(config.api_timeout);
    kube_config.write_timeout = Some(config.api_timeout);
    let client = Client::try_from(kube_config)?;
    tracing::info!(api_timeout = ?config.api_timeout, "Connected to Kubernetes cluster");

    let ctx = Arc::new(ControllerContext::new(
        client.clone(),
        config.engine_settings(),
    ));

    let controller = run_schedule_controller(client, ctx.clone());

    if config.no_dashboard {
        controller.await?;
        return Ok(());
    }

    let dashboard = Arc::new(Dashboard::new(ctx.schedules.clone(), ctx.workloads.clone()));

    tokio::select! {
        result = controller => {
            tracing::info!("Schedule controller exited");
            result?;
        }
        result = dashboard.serve(config.dashboard_addr) => {
            tracing::error!("Dashboard exited: {:?}", result);
            result?;
        }
    }

    Ok(())
}

/// Run the CronScaleSchedule controller until shutdown.
async fn run_schedule_controller(
    client: Client,
    ctx: Arc<ControllerContext>,
) -> anyhow::Result<()> {
    tracing::info!("Starting CronScaleSchedule controller");

    let schedules: Api<CronScaleSchedule> = Api::all(client);
    let controller = ScheduleController::new(ctx.clone());

    Controller::new(schedules, WatcherConfig::default())
        .shutdown_on_signal()
        .run(
            move |schedule, _ctx| {
                let controller = controller.clone();
                async move {
                    controller
                        .reconcile(schedule)
                        .await
                        .map(ReconcileAction::into_action)
                }
            },
            error_policy,
            ctx,
        )
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    tracing::debug!(
                        schedule = %obj.name,
                        namespace = ?obj.namespace,
                        ?action,
                        "Reconciled schedule"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Schedule controller stream error");
                }
            }
        })
        .await;

    Ok(())
}

/// Print the CRD as YAML.
fn generate_crds() -> anyhow::Result<()> {
    println!("---");
    println!("{}", serde_yaml::to_string(&CronScaleSchedule::crd())?);
    Ok(())
}
