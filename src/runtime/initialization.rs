//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::{ControllerConfig, ServerConfig};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::OneAgentApm;
use crate::dtclient::ClientFactory;
use crate::observability::Metrics;
use crate::store::KubeStore;
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

/// Initialization result containing all necessary components for the controller
#[derive(Debug)]
pub struct InitializationResult {
    /// API for the OneAgentAPM CRD, scoped to the watched namespace
    pub agents: Api<OneAgentApm>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: ServerState,
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Configuration and metrics
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
pub async fn initialize() -> Result<InitializationResult> {
    // Required for rustls 0.23+ when no default provider is set via features
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oneagent_apm_controller=info".into()),
        )
        .init();

    if !provider_installed {
        warn!("rustls crypto provider was already installed");
    }

    info!(
        "Starting OneAgentAPM controller v{}",
        env!("CARGO_PKG_VERSION")
    );

    let server_config = ServerConfig::from_env();
    let controller_config = ControllerConfig::from_env()?;
    info!(
        watch_namespace = controller_config.watch_namespace.as_deref().unwrap_or("*"),
        check_paas_token = controller_config.token_policy.check_paas_token,
        check_api_token = controller_config.token_policy.check_api_token,
        "Controller configuration loaded"
    );

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    let server_state = ServerState::new(metrics.clone());

    // Start HTTP server for metrics and probes in the background
    let server_state_clone = server_state.clone();
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {:#}", e);
        }
    });

    wait_for_server_ready(&server_config, &server_state, &server_handle).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let agents: Api<OneAgentApm> = match controller_config.watch_namespace.as_deref() {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };

    let clients = ClientFactory::live(controller_config.api_timeout);
    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeStore::new(client)),
        clients,
        controller_config,
        metrics,
    ));

    check_crd_queryable(&agents).await;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        agents,
        reconciler,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    config: &ServerConfig,
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = config.startup_timeout();
    let poll_interval = config.poll_interval();
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Log existing resources by namespace, or why they cannot be listed
///
/// A failure here is not fatal; the watch keeps retrying on its own.
async fn check_crd_queryable(agents: &Api<OneAgentApm>) {
    let span = tracing::span!(
        tracing::Level::INFO,
        "controller.startup.list_existing",
        resource.kind = "OneAgentAPM"
    );

    match agents.list(&ListParams::default()).instrument(span.clone()).await {
        Ok(list) => {
            let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for item in &list.items {
                by_namespace
                    .entry(item.namespace().unwrap_or_else(|| "default".to_string()))
                    .or_default()
                    .push(item.name_any());
            }

            let _guard = span.enter();
            info!(
                "CRD is queryable, found {} existing OneAgentAPM resources in {} namespaces",
                list.items.len(),
                by_namespace.len()
            );
            for (namespace, mut names) in by_namespace {
                names.sort();
                info!("  {}: {}", namespace, names.join(", "));
            }
        }
        Err(e) => {
            let _guard = span.enter();
            error!("CRD is not queryable; {:?}. Is the CRD installed?", e);
            error!("Installation: cargo run --bin crdgen | kubectl apply -f -");
            warn!(error = %e, "Continuing despite CRD queryability check failure");
        }
    }
}
