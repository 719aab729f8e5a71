//! # In-memory Store
//!
//! Holds resources and secrets in process. Every write bumps a resource
//! version and status writes carrying a stale version are refused, the same
//! way the API server refuses them.

use super::{ObjectStore, SecretData, StoreError};
use crate::crd::{ObjectKey, OneAgentApm};
use async_trait::async_trait;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    agents: BTreeMap<ObjectKey, OneAgentApm>,
    secrets: BTreeMap<ObjectKey, SecretData>,
    last_version: u64,
    status_writes: usize,
}

impl Inner {
    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }
}

/// [`ObjectStore`] kept in memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or overwrite a resource, assigning it a fresh resource version
    pub fn insert_agent(&self, mut agent: OneAgentApm) {
        let mut inner = self.lock();
        agent.metadata.resource_version = Some(inner.next_version());
        inner.agents.insert(ObjectKey::from_resource(&agent), agent);
    }

    pub fn remove_agent(&self, key: &ObjectKey) -> Option<OneAgentApm> {
        self.lock().agents.remove(key)
    }

    /// Current stored copy of a resource
    pub fn agent(&self, key: &ObjectKey) -> Option<OneAgentApm> {
        self.lock().agents.get(key).cloned()
    }

    pub fn insert_secret<K, V>(&self, namespace: &str, name: &str, data: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let data = data
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.lock()
            .secrets
            .insert(ObjectKey::new(namespace, name), data);
    }

    pub fn remove_secret(&self, namespace: &str, name: &str) -> Option<SecretData> {
        self.lock().secrets.remove(&ObjectKey::new(namespace, name))
    }

    /// Bump a resource's version as if another writer had modified it
    pub fn touch(&self, key: &ObjectKey) {
        let mut inner = self.lock();
        let version = inner.next_version();
        if let Some(agent) = inner.agents.get_mut(key) {
            agent.metadata.resource_version = Some(version);
        }
    }

    /// Number of accepted status writes
    pub fn status_writes(&self) -> usize {
        self.lock().status_writes
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get_agent(&self, key: &ObjectKey) -> Result<Option<OneAgentApm>, StoreError> {
        Ok(self.agent(key))
    }

    async fn get_secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SecretData>, StoreError> {
        Ok(self
            .lock()
            .secrets
            .get(&ObjectKey::new(namespace, name))
            .cloned())
    }

    async fn replace_status(&self, agent: &OneAgentApm) -> Result<(), StoreError> {
        let key = ObjectKey::from_resource(agent);
        let mut inner = self.lock();

        let stored_version = match inner.agents.get(&key) {
            Some(stored) => stored.resource_version(),
            None => {
                return Err(StoreError::NotFound {
                    kind: "OneAgentAPM",
                    key: key.to_string(),
                })
            }
        };
        if stored_version != agent.resource_version() {
            return Err(StoreError::Conflict {
                key: key.to_string(),
                message: format!(
                    "resource version {:?} does not match stored {:?}",
                    agent.resource_version(),
                    stored_version
                ),
            });
        }

        let version = inner.next_version();
        inner.status_writes += 1;
        if let Some(stored) = inner.agents.get_mut(&key) {
            stored.status = agent.status.clone();
            stored.metadata.resource_version = Some(version);
        }
        Ok(())
    }
}
