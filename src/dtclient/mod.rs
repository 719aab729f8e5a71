//! # Dynatrace API Client
//!
//! Client for the Dynatrace token lookup API.
//!
//! The controller only needs one capability from Dynatrace: asking which
//! scopes a token carries. [`DynatraceClient`] is that capability; the REST
//! implementation talks to a real environment, tests substitute their own.

mod factory;
mod rest;
mod validator;

pub use factory::{ClientBuildError, ClientFactory, ConnectionSettings};
pub use rest::DynatraceRestClient;
pub use validator::{validate_scopes, ScopeVerdict};

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

/// Scope required by a PaaS token to download installers
pub const TOKEN_SCOPE_INSTALLER_DOWNLOAD: &str = "InstallerDownload";
/// Scope required by an API token to export data
pub const TOKEN_SCOPE_DATA_EXPORT: &str = "DataExport";

/// Capability check against the Dynatrace API
#[async_trait]
pub trait DynatraceClient: Send + Sync + std::fmt::Debug {
    /// Look up the scopes granted to `token`
    async fn get_token_scopes(&self, token: &str) -> Result<TokenScopes, DtClientError>;
}

/// Set of scopes granted to a token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenScopes(BTreeSet<String>);

impl TokenScopes {
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// First scope in `required` that this set does not grant
    pub fn first_missing<'a>(&self, required: &[&'a str]) -> Option<&'a str> {
        required.iter().copied().find(|scope| !self.contains(scope))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TokenScopes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Errors returned by Dynatrace API calls
#[derive(Debug, Error)]
pub enum DtClientError {
    /// Request never got an HTTP response
    #[error("Dynatrace API request failed: {0}")]
    Transport(String),
    /// No response within the caller's deadline
    #[error("Dynatrace API request timed out after {0:?}")]
    Timeout(Duration),
    /// The API answered with an error status
    #[error("Dynatrace API returned {code}: {message}")]
    Server { code: u16, message: String },
    /// The API answered but the body could not be understood
    #[error("unexpected Dynatrace API response: {0}")]
    InvalidResponse(String),
}

impl DtClientError {
    /// The API authoritatively refused the token
    pub fn is_rejection(&self) -> bool {
        matches!(self, DtClientError::Server { code: 401 | 403, .. })
    }

    /// Worth retrying without any change to the token or the resource
    pub fn is_transient(&self) -> bool {
        !self.is_rejection()
    }
}

impl From<reqwest::Error> for DtClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DtClientError::InvalidResponse(err.to_string())
        } else {
            DtClientError::Transport(err.to_string())
        }
    }
}
