//! # Client Factory
//!
//! Produces the [`DynatraceClient`] used to validate a resource's tokens.
//!
//! `Live` builds a REST client from the resource's connection settings.
//! `Static` hands out one pre-configured client regardless of settings, which
//! is how tests run the reconciler without network access.
//! Building a client never performs network I/O.

use super::{DynatraceClient, DynatraceRestClient};
use crate::crd::OneAgentApmSpec;
use reqwest::{Client, Proxy, Url};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Connection settings taken from a resource spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub api_url: String,
    pub skip_cert_check: bool,
    pub proxy: Option<String>,
}

impl ConnectionSettings {
    pub fn from_spec(spec: &OneAgentApmSpec) -> Self {
        Self {
            api_url: spec.api_url.trim().to_string(),
            skip_cert_check: spec.skip_cert_check,
            proxy: spec.proxy.clone().filter(|p| !p.trim().is_empty()),
        }
    }
}

/// Permanent failures while building a client
#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid API URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("invalid proxy '{proxy}': {reason}")]
    InvalidProxy { proxy: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Http(String),
}

/// Source of Dynatrace clients for the reconciler
#[derive(Debug, Clone)]
pub enum ClientFactory {
    /// Build a REST client per resource and credential
    Live {
        /// Per-request timeout applied by the HTTP client
        request_timeout: Duration,
    },
    /// Always return the same client
    Static(Arc<dyn DynatraceClient>),
}

impl ClientFactory {
    pub fn live(request_timeout: Duration) -> Self {
        ClientFactory::Live { request_timeout }
    }

    pub fn fixed(client: Arc<dyn DynatraceClient>) -> Self {
        ClientFactory::Static(client)
    }

    /// Client bound to `settings` that authenticates with `credential`
    pub fn build(
        &self,
        settings: &ConnectionSettings,
        credential: &str,
    ) -> Result<Arc<dyn DynatraceClient>, ClientBuildError> {
        match self {
            ClientFactory::Static(client) => Ok(Arc::clone(client)),
            ClientFactory::Live { request_timeout } => {
                let api_url = parse_api_url(&settings.api_url)?;

                let mut builder = Client::builder()
                    .timeout(*request_timeout)
                    .danger_accept_invalid_certs(settings.skip_cert_check);

                if let Some(proxy) = settings.proxy.as_deref() {
                    let proxy = Proxy::all(proxy).map_err(|e| ClientBuildError::InvalidProxy {
                        proxy: proxy.to_string(),
                        reason: e.to_string(),
                    })?;
                    builder = builder.proxy(proxy);
                }

                let http_client = builder
                    .build()
                    .map_err(|e| ClientBuildError::Http(e.to_string()))?;

                Ok(Arc::new(DynatraceRestClient::new(
                    http_client,
                    api_url.as_str(),
                    credential,
                )))
            }
        }
    }
}

/// Validate an environment API URL
fn parse_api_url(raw: &str) -> Result<Url, ClientBuildError> {
    let invalid = |reason: &str| ClientBuildError::InvalidEndpoint {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    if raw.is_empty() {
        return Err(invalid("apiUrl is required but is empty"));
    }
    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("host is missing"));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtclient::{DtClientError, TokenScopes};
    use async_trait::async_trait;

    #[derive(Debug)]
    struct NeverCalled;

    #[async_trait]
    impl DynatraceClient for NeverCalled {
        async fn get_token_scopes(&self, _token: &str) -> Result<TokenScopes, DtClientError> {
            panic!("factory must not perform API calls");
        }
    }

    fn settings(api_url: &str) -> ConnectionSettings {
        ConnectionSettings {
            api_url: api_url.to_string(),
            skip_cert_check: false,
            proxy: None,
        }
    }

    #[test]
    fn test_static_factory_returns_injected_client() {
        let injected: Arc<dyn DynatraceClient> = Arc::new(NeverCalled);
        let factory = ClientFactory::fixed(Arc::clone(&injected));

        let client = factory.build(&settings("not a url"), "42").unwrap();
        assert!(Arc::ptr_eq(&client, &injected));
    }

    #[test]
    fn test_live_factory_builds_without_network() {
        let factory = ClientFactory::live(Duration::from_secs(5));
        let result = factory.build(&settings("https://ENVIRONMENTID.live.dynatrace.com/api"), "42");
        assert!(result.is_ok());
    }

    #[test]
    fn test_live_factory_rejects_malformed_endpoint() {
        let factory = ClientFactory::live(Duration::from_secs(5));

        for url in ["", "ENVIRONMENTID.live.dynatrace.com/api", "ftp://example.com/api"] {
            match factory.build(&settings(url), "42") {
                Err(ClientBuildError::InvalidEndpoint { .. }) => {}
                other => panic!("expected InvalidEndpoint for {url:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_live_factory_rejects_malformed_proxy() {
        let factory = ClientFactory::live(Duration::from_secs(5));
        let mut settings = settings("https://example.com/api");
        settings.proxy = Some("::not a proxy::".to_string());

        assert!(matches!(
            factory.build(&settings, "42"),
            Err(ClientBuildError::InvalidProxy { .. })
        ));
    }

    #[test]
    fn test_settings_from_spec_ignores_blank_proxy() {
        let spec = OneAgentApmSpec {
            api_url: " https://example.com/api ".to_string(),
            tokens: None,
            update_token_policy: true,
            skip_cert_check: true,
            proxy: Some("  ".to_string()),
        };
        let settings = ConnectionSettings::from_spec(&spec);
        assert_eq!(settings.api_url, "https://example.com/api");
        assert!(settings.skip_cert_check);
        assert!(settings.proxy.is_none());
    }
}
