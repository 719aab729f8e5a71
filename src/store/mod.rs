//! # Object Store
//!
//! Reads and writes the reconciler needs from the cluster.
//!
//! - `kubernetes` - backed by the Kubernetes API server
//! - `memory` - in-process store with resource versions, used by tests

mod kubernetes;
mod memory;

pub use kubernetes::KubeStore;
pub use memory::InMemoryStore;

use crate::crd::{ObjectKey, OneAgentApm};
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Secret contents keyed by data key
pub type SecretData = BTreeMap<String, Vec<u8>>;

/// Storage operations used during reconciliation
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Fetch a resource, `None` if it does not exist
    async fn get_agent(&self, key: &ObjectKey) -> Result<Option<OneAgentApm>, StoreError>;

    /// Fetch a secret's data, `None` if the secret does not exist
    async fn get_secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SecretData>, StoreError>;

    /// Write `agent.status`, guarded by `agent.metadata.resourceVersion`
    async fn replace_status(&self, agent: &OneAgentApm) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },
    /// The object changed since it was read
    #[error("conflict writing {key}: {message}")]
    Conflict { key: String, message: String },
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("failed to serialize object: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
