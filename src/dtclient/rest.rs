//! # REST Client
//!
//! reqwest-based implementation of [`DynatraceClient`].
//!
//! Token lookup: `POST {apiUrl}/v1/tokens/lookup` with `{"token": "..."}`,
//! answered by `{"scopes": [...]}`. Errors come back as
//! `{"error": {"code": 401, "message": "..."}}`.

use super::{DtClientError, DynatraceClient, TokenScopes};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

#[derive(Debug, Serialize)]
struct TokenLookupRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenLookupResponse {
    #[serde(default)]
    scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

/// Dynatrace REST API client bound to one environment and credential
pub struct DynatraceRestClient {
    http_client: Client,
    api_url: String,
    credential: Zeroizing<String>,
}

impl std::fmt::Debug for DynatraceRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynatraceRestClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl DynatraceRestClient {
    /// Wrap an already configured HTTP client
    ///
    /// `api_url` is the environment API root, e.g. `https://abc123.live.dynatrace.com/api`.
    pub fn new(http_client: Client, api_url: &str, credential: &str) -> Self {
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            credential: Zeroizing::new(credential.to_string()),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn token_lookup_url(&self) -> String {
        format!("{}/v1/tokens/lookup", self.api_url)
    }
}

#[async_trait]
impl DynatraceClient for DynatraceRestClient {
    async fn get_token_scopes(&self, token: &str) -> Result<TokenScopes, DtClientError> {
        let url = self.token_lookup_url();
        debug!(url = %url, "Looking up Dynatrace token scopes");

        let response = self
            .http_client
            .post(&url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Api-Token {}", self.credential.as_str()),
            )
            .json(&TokenLookupRequest { token })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: TokenLookupResponse = response.json().await?;
            return Ok(body.scopes.into_iter().collect());
        }

        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&text) {
            Ok(envelope) => (
                envelope.error.code.unwrap_or_else(|| status.as_u16()),
                envelope.error.message,
            ),
            Err(_) => (status.as_u16(), text),
        };
        Err(DtClientError::Server { code, message })
    }
}
