//! # Kubernetes-backed Store

use super::{ObjectStore, SecretData, StoreError};
use crate::constants::FIELD_MANAGER;
use crate::crd::{ObjectKey, OneAgentApm};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use tracing::debug;

/// [`ObjectStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_agent(&self, key: &ObjectKey) -> Result<Option<OneAgentApm>, StoreError> {
        let api: Api<OneAgentApm> = Api::namespaced(self.client.clone(), &key.namespace);
        Ok(api.get_opt(&key.name).await?)
    }

    async fn get_secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SecretData>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let Some(secret) = api.get_opt(name).await? else {
            return Ok(None);
        };

        let data = secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.0))
            .collect();
        Ok(Some(data))
    }

    async fn replace_status(&self, agent: &OneAgentApm) -> Result<(), StoreError> {
        let key = ObjectKey::from_resource(agent);
        let api: Api<OneAgentApm> = Api::namespaced(self.client.clone(), &key.namespace);

        // resourceVersion in the body makes the API server reject stale writes with 409
        let patch = serde_json::json!({
            "metadata": {
                "resourceVersion": agent.resource_version(),
            },
            "status": serde_json::to_value(&agent.status)?,
        });

        match api
            .patch_status(
                &key.name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                debug!(resource = %key, "Status write rejected, resource version is stale");
                Err(StoreError::Conflict {
                    key: key.to_string(),
                    message: api_err.message.clone(),
                })
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Err(StoreError::NotFound {
                kind: "OneAgentAPM",
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
