//! # Watch Loop
//!
//! Runs the `OneAgentAPM` controller until a shutdown signal arrives.

use super::error_policy::{error_policy, handle_watch_stream_error};
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::OneAgentApm;
use anyhow::Result;
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::{watcher, Controller};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

/// Watch `agents` and reconcile every change
///
/// The runtime serializes reconciliations per object and runs distinct
/// objects concurrently.
pub async fn run_watch_loop(
    agents: Api<OneAgentApm>,
    reconciler: Arc<Reconciler>,
    server_state: ServerState,
) -> Result<()> {
    info!("Starting OneAgentAPM watch loop");

    Controller::new(agents, watcher::Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => {
                    debug!(
                        resource.name = %object.name,
                        resource.namespace = ?object.namespace,
                        ?action,
                        "Reconciled"
                    );
                }
                Err(e) => {
                    handle_watch_stream_error(&e.to_string());
                }
            }
        })
        .await;

    server_state.is_ready.store(false, Ordering::Relaxed);
    info!("Watch loop stopped");
    Ok(())
}
