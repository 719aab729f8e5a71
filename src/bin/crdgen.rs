//! Print the OneAgentAPM CustomResourceDefinition as YAML
//!
//! Usage:
//!   cargo run --bin crdgen > config/crd/oneagentapm.yaml

use kube::CustomResourceExt;
use oneagent_apm_controller::OneAgentApm;

fn main() -> anyhow::Result<()> {
    let crd = serde_yaml::to_string(&OneAgentApm::crd())
        .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
    print!("{crd}");
    Ok(())
}
