//! # Credential Validator
//!
//! Maps a token scope lookup to a verdict.
//!
//! Only transient failures come back as `Err`; an authoritative "no" from the
//! API is a verdict like any other.

use super::{DtClientError, DynatraceClient};
use std::time::Duration;

/// Outcome of checking a token against its required scopes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeVerdict {
    /// Token is valid and carries every required scope
    Adequate,
    /// Token is invalid or expired
    Rejected,
    /// Token is valid but lacks this scope
    MissingScope(String),
}

impl ScopeVerdict {
    pub fn is_adequate(&self) -> bool {
        matches!(self, ScopeVerdict::Adequate)
    }

    /// Human-readable explanation used as condition message
    pub fn message(&self) -> String {
        match self {
            ScopeVerdict::Adequate => "Ready".to_string(),
            ScopeVerdict::Rejected => "token rejected".to_string(),
            ScopeVerdict::MissingScope(scope) => format!("missing scope: {scope}"),
        }
    }
}

/// Check `token` once against the API, giving up after `timeout`
///
/// # Errors
///
/// Returns a transient [`DtClientError`] when the check could not complete.
pub async fn validate_scopes(
    client: &dyn DynatraceClient,
    token: &str,
    required: &[&str],
    timeout: Duration,
) -> Result<ScopeVerdict, DtClientError> {
    let scopes = match tokio::time::timeout(timeout, client.get_token_scopes(token)).await {
        Ok(Ok(scopes)) => scopes,
        Ok(Err(e)) if e.is_rejection() => return Ok(ScopeVerdict::Rejected),
        Ok(Err(e)) => return Err(e),
        Err(_elapsed) => return Err(DtClientError::Timeout(timeout)),
    };

    Ok(match scopes.first_missing(required) {
        Some(scope) => ScopeVerdict::MissingScope(scope.to_string()),
        None => ScopeVerdict::Adequate,
    })
}
