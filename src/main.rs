// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{routing::get, Router};
use clap::Parser;
use futures::StreamExt;
use hubmgr::{
    cert_rotation::{CertRotationConfig, CertRotationController},
    context::Context,
    crd::ClusterManager,
    hub_resources::HubNames,
    metrics,
    reconcilers::{error_policy, reconcile, KubeClusterState, ReconcileOptions},
};
use k8s_openapi::api::apps::v1::Deployment;
use kube::{
    runtime::{reflector::ObjectRef, watcher::Config, Controller},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Command-line options of the operator process.
#[derive(Debug, Parser)]
#[command(name = "hubmgr", about = "Cluster Manager hub operator for Kubernetes")]
struct Options {
    /// Namespace the operator runs in (source of the work driver config secret)
    #[arg(long, default_value = "open-cluster-management")]
    operator_namespace: String,

    /// Address the metrics and health endpoints listen on
    #[arg(long, default_value = "0.0.0.0:8383")]
    metrics_addr: String,

    /// Rotation loop interval in seconds
    #[arg(long, default_value_t = 600)]
    cert_resync_seconds: u64,

    /// Signing CA validity in seconds
    #[arg(long, default_value_t = 365 * 24 * 3600)]
    signing_cert_validity_seconds: u64,

    /// Serving certificate validity in seconds
    #[arg(long, default_value_t = 30 * 24 * 3600)]
    serving_cert_validity_seconds: u64,
}

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("hubmgr-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Respects RUST_LOG for filtering and RUST_LOG_FORMAT for text/json output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    let options = Options::parse();
    info!("Starting Cluster Manager hub operator");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let reconcile_options = ReconcileOptions {
        operator_namespace: options.operator_namespace.clone(),
        agent_image: std::env::var("AGENT_IMAGE").ok(),
    };
    let ctx = Arc::new(Context::new(client.clone(), reconcile_options));

    // Metrics and health endpoints
    let app = Router::new()
        .route("/metrics", get(|| async { metrics::gather() }))
        .route("/healthz", get(|| async { "ok" }));
    let listener = tokio::net::TcpListener::bind(&options.metrics_addr).await?;
    info!(addr = %options.metrics_addr, "Serving metrics");
    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, app).await {
            error!(%error, "Metrics server terminated");
        }
    });

    // Certificate rotation runs on its own timer, decoupled from spec
    // reconciliation events.
    let rotation_config = CertRotationConfig {
        resync_interval: Duration::from_secs(options.cert_resync_seconds),
        signing_validity: Duration::from_secs(options.signing_cert_validity_seconds),
        target_validity: Duration::from_secs(options.serving_cert_validity_seconds),
    };
    let rotation = CertRotationController::new(
        KubeClusterState::new(client.clone()),
        HubNames::new("cluster-manager"),
        rotation_config,
    );
    tokio::spawn(async move { rotation.run().await });

    // The controller serializes passes per ClusterManager; hub deployment
    // changes map back to their owner through the createdByClusterManager
    // label so condition updates follow rollouts.
    let cluster_managers: Api<ClusterManager> = Api::all(client.clone());
    let deployments: Api<Deployment> = Api::all(client.clone());

    info!("Starting ClusterManager controller");
    Controller::new(cluster_managers, Config::default())
        .watches(deployments, Config::default(), |deployment: Deployment| {
            deployment
                .labels()
                .get(hubmgr::labels::HUB_LABEL_KEY)
                .map(|owner| ObjectRef::new(owner))
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!(cluster_manager = %object.name, "Reconciled"),
                Err(error) => error!(%error, "Reconciliation stream error"),
            }
        })
        .await;

    info!("Controller stream terminated, shutting down");
    Ok(())
}
