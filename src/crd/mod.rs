//! # Custom Resource Definitions
//!
//! CRD types for the OneAgentAPM controller.
//!
//! `OneAgentAPM` declares where a Dynatrace environment lives and which secret
//! holds the tokens used to talk to it. The controller only ever writes the
//! status subresource.

mod status;

pub use status::{
    Condition, ConditionStatus, ConditionType, Conditions, OneAgentApmStatus,
};

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// OneAgentAPM Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: dynatrace.com/v1alpha1
/// kind: OneAgentAPM
/// metadata:
///   name: oneagent
///   namespace: dynatrace
/// spec:
///   apiUrl: https://ENVIRONMENTID.live.dynatrace.com/api
///   tokens: oneagent
/// ```
#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "OneAgentAPM",
    root = "OneAgentApm",
    group = "dynatrace.com",
    version = "v1alpha1",
    namespaced,
    status = "OneAgentApmStatus",
    shortname = "oaapm",
    printcolumn = r#"{"name":"ApiUrl", "type":"string", "jsonPath":".spec.apiUrl"}, {"name":"PaaSToken", "type":"string", "jsonPath":".status.conditions[?(@.type==\"PaaSToken\")].status"}, {"name":"APIToken", "type":"string", "jsonPath":".status.conditions[?(@.type==\"APIToken\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct OneAgentApmSpec {
    /// Dynatrace environment API endpoint
    /// Example: https://ENVIRONMENTID.live.dynatrace.com/api
    pub api_url: String,
    /// Name of the secret holding the `paasToken` and `apiToken` keys.
    /// Defaults to the name of this resource.
    #[serde(default)]
    pub tokens: Option<String>,
    /// Whether the controller should validate tokens and record token conditions.
    /// When false, existing token conditions are left as they are.
    /// Default: true
    #[serde(default = "default_true")]
    pub update_token_policy: bool,
    /// Disable TLS certificate validation when talking to the Dynatrace API
    /// Default: false
    #[serde(default)]
    pub skip_cert_check: bool,
    /// HTTP proxy used for Dynatrace API calls (e.g. "http://proxy.internal:3128")
    #[serde(default)]
    pub proxy: Option<String>,
}

fn default_true() -> bool {
    true
}

impl OneAgentApm {
    /// Name of the secret holding this resource's tokens
    pub fn tokens_secret_name(&self) -> String {
        match self.spec.tokens.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.name_any(),
        }
    }
}

/// Identity of a namespaced resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an object as delivered by the watch
    pub fn from_resource<K: kube::Resource>(obj: &K) -> Self {
        Self {
            namespace: obj.namespace().unwrap_or_else(|| "default".to_string()),
            name: obj.name_any(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
