//! # OneAgentAPM Controller
//!
//! A Kubernetes controller that validates the Dynatrace tokens referenced by
//! `OneAgentAPM` resources.
//!
//! For every resource it reads the tokens secret, asks the Dynatrace API
//! which scopes each token carries, and records the result as `PaaSToken`
//! and `APIToken` status conditions.
//!
//! ## Features
//!
//! - **Token validation**: PaaS tokens need `InstallerDownload`, API tokens `DataExport`
//! - **Namespace scoping**: set `WATCH_NAMESPACE` to watch a single namespace
//! - **Prometheus metrics**: exposed on `/metrics`
//! - **Health probes**: `/healthz` and `/readyz`

use anyhow::Result;
use oneagent_apm_controller::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;

    run_watch_loop(
        init_result.agents,
        init_result.reconciler,
        init_result.server_state,
    )
    .await
}
