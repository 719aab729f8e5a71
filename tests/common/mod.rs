//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use oneagent_apm_controller::config::ControllerConfig;
use oneagent_apm_controller::controller::reconciler::Reconciler;
use oneagent_apm_controller::dtclient::{ClientFactory, DtClientError, DynatraceClient, TokenScopes};
use oneagent_apm_controller::observability::Metrics;
use oneagent_apm_controller::store::{InMemoryStore, ObjectStore};
use oneagent_apm_controller::{ObjectKey, OneAgentApm, OneAgentApmSpec};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NAMESPACE: &str = "dynatrace";
pub const NAME: &str = "oneagent";
pub const API_URL: &str = "https://ENVIRONMENTID.live.dynatrace.com/api";

pub fn key() -> ObjectKey {
    ObjectKey::new(NAMESPACE, NAME)
}

pub fn agent() -> OneAgentApm {
    let mut agent = OneAgentApm::new(
        NAME,
        OneAgentApmSpec {
            api_url: API_URL.to_string(),
            tokens: None,
            update_token_policy: true,
            skip_cert_check: false,
            proxy: None,
        },
    );
    agent.metadata.namespace = Some(NAMESPACE.to_string());
    agent.metadata.generation = Some(1);
    agent
}

/// Canned answer of the stub client
#[derive(Debug, Clone)]
pub enum Reply {
    Scopes(Vec<String>),
    Status(u16),
    /// Answer with the given scopes only after sleeping this long
    Hang(Duration),
}

impl Reply {
    pub fn scopes(scopes: &[&str]) -> Self {
        Reply::Scopes(scopes.iter().map(|s| s.to_string()).collect())
    }
}

/// Stub Dynatrace client that records every token it is asked about
#[derive(Debug)]
pub struct RecordingDynatraceClient {
    default_reply: Reply,
    replies: HashMap<String, Reply>,
    expected_tokens: Option<Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl RecordingDynatraceClient {
    pub fn new(default_reply: Reply) -> Self {
        Self {
            default_reply,
            replies: HashMap::new(),
            expected_tokens: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer `token` with `reply` instead of the default
    pub fn with_reply_for(mut self, token: &str, reply: Reply) -> Self {
        self.replies.insert(token.to_string(), reply);
        self
    }

    /// Panic on any lookup for a token outside `tokens`
    pub fn expecting(mut self, tokens: &[&str]) -> Self {
        self.expected_tokens = Some(tokens.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn assert_called_once_with(&self, token: &str) {
        assert_eq!(self.calls(), vec![token.to_string()]);
    }
}

#[async_trait]
impl DynatraceClient for RecordingDynatraceClient {
    async fn get_token_scopes(&self, token: &str) -> Result<TokenScopes, DtClientError> {
        if let Some(expected) = &self.expected_tokens {
            assert!(
                expected.iter().any(|t| t == token),
                "unexpected token lookup for {token:?}, expected one of {expected:?}"
            );
        }
        self.calls.lock().unwrap().push(token.to_string());

        match self.replies.get(token).unwrap_or(&self.default_reply) {
            Reply::Scopes(scopes) => Ok(scopes.iter().cloned().collect()),
            Reply::Status(code) => Err(DtClientError::Server {
                code: *code,
                message: format!("stub status {code}"),
            }),
            Reply::Hang(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(TokenScopes::default())
            }
        }
    }
}

/// Reconciler wired to an in-memory store and a stub client
pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub client: Arc<RecordingDynatraceClient>,
    pub metrics: Arc<Metrics>,
    pub reconciler: Reconciler,
}

impl Fixture {
    pub fn new(client: RecordingDynatraceClient) -> Self {
        Self::with_config(client, ControllerConfig::default())
    }

    pub fn with_config(client: RecordingDynatraceClient, config: ControllerConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::with_store(store.clone(), store, client, config)
    }

    /// Reconciler reading and writing through `object_store`, which wraps `store`
    pub fn with_store(
        store: Arc<InMemoryStore>,
        object_store: Arc<dyn ObjectStore>,
        client: RecordingDynatraceClient,
        config: ControllerConfig,
    ) -> Self {
        let client = Arc::new(client);
        let metrics = Arc::new(Metrics::new().unwrap());
        let reconciler = Reconciler::new(
            object_store,
            ClientFactory::fixed(client.clone()),
            config,
            metrics.clone(),
        );
        Self {
            store,
            client,
            metrics,
            reconciler,
        }
    }

    pub fn stored(&self) -> OneAgentApm {
        self.store.agent(&key()).expect("resource should exist")
    }
}
