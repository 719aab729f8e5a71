//! # Token Checks
//!
//! Resolves the tokens secret and validates each checked token type.

use super::types::Reconciler;
use crate::constants::{API_TOKEN_KEY, PAAS_TOKEN_KEY};
use crate::crd::{ConditionStatus, ConditionType, OneAgentApm};
use crate::dtclient::{
    validate_scopes, ConnectionSettings, ScopeVerdict, TOKEN_SCOPE_DATA_EXPORT,
    TOKEN_SCOPE_INSTALLER_DOWNLOAD,
};
use crate::store::{SecretData, StoreError};
use kube::ResourceExt;
use tracing::{debug, info, warn};

pub(crate) const REASON_READY: &str = "TokenReady";
pub(crate) const REASON_SECRET_NOT_FOUND: &str = "TokenSecretNotFound";
pub(crate) const REASON_MISSING: &str = "TokenMissing";
pub(crate) const REASON_UNAUTHORIZED: &str = "TokenUnauthorized";
pub(crate) const REASON_SCOPE_MISSING: &str = "TokenScopeMissing";
pub(crate) const REASON_ERROR: &str = "TokenError";
pub(crate) const REASON_INVALID_ENDPOINT: &str = "InvalidEndpoint";
pub(crate) const REASON_NOT_VALIDATED: &str = "NotValidated";

/// How a token check ended, driving the requeue decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckClass {
    Ready,
    Transient,
    Rejected,
    OperatorError,
    ConfigError,
}

/// Condition to record for one token type
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TokenCheck {
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: &'static str,
    pub message: String,
    pub class: CheckClass,
}

impl TokenCheck {
    fn new(
        condition_type: &ConditionType,
        status: ConditionStatus,
        reason: &'static str,
        message: impl Into<String>,
        class: CheckClass,
    ) -> Self {
        Self {
            condition_type: condition_type.clone(),
            status,
            reason,
            message: message.into(),
            class,
        }
    }
}

const PAAS_TOKEN_SCOPES: &[&str] = &[TOKEN_SCOPE_INSTALLER_DOWNLOAD];
const API_TOKEN_SCOPES: &[&str] = &[TOKEN_SCOPE_DATA_EXPORT];

/// Secret key and required scopes for a token type
fn token_requirements(
    condition_type: &ConditionType,
) -> Option<(&'static str, &'static [&'static str])> {
    match condition_type {
        ConditionType::PaaSToken => Some((PAAS_TOKEN_KEY, PAAS_TOKEN_SCOPES)),
        ConditionType::ApiToken => Some((API_TOKEN_KEY, API_TOKEN_SCOPES)),
        ConditionType::Other(_) => None,
    }
}

/// Non-empty UTF-8 value stored under `key`
fn secret_value<'a>(data: &'a SecretData, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl Reconciler {
    /// Token types validated for every resource
    pub(crate) fn checked_token_types(&self) -> Vec<ConditionType> {
        ConditionType::TOKEN_TYPES
            .iter()
            .filter(|t| self.config.token_policy.checks(t))
            .cloned()
            .collect()
    }

    /// Resolve the tokens secret and check every token type the policy selects
    ///
    /// Only store failures other than a missing secret are errors.
    pub(crate) async fn check_tokens(
        &self,
        agent: &OneAgentApm,
    ) -> Result<Vec<TokenCheck>, StoreError> {
        let checked = self.checked_token_types();
        if checked.is_empty() {
            return Ok(Vec::new());
        }

        let namespace = agent.namespace().unwrap_or_else(|| "default".to_string());
        let secret_name = agent.tokens_secret_name();

        let Some(data) = self.store.get_secret_data(&namespace, &secret_name).await? else {
            warn!(
                secret.name = %secret_name,
                secret.namespace = %namespace,
                "Tokens secret not found"
            );
            let message = format!("secret {namespace}/{secret_name} not found");
            return Ok(checked
                .iter()
                .map(|t| {
                    TokenCheck::new(
                        t,
                        ConditionStatus::False,
                        REASON_SECRET_NOT_FOUND,
                        message.clone(),
                        CheckClass::OperatorError,
                    )
                })
                .collect());
        };

        let settings = ConnectionSettings::from_spec(&agent.spec);
        let mut checks = Vec::with_capacity(checked.len());
        for condition_type in &checked {
            let check = self
                .check_token(condition_type, &data, &settings, &namespace, &secret_name)
                .await;
            info!(
                token = %condition_type,
                status = %check.status,
                reason = check.reason,
                "Token checked"
            );
            self.metrics
                .increment_token_validations(condition_type.as_str(), check.reason);
            checks.push(check);
        }
        Ok(checks)
    }

    async fn check_token(
        &self,
        condition_type: &ConditionType,
        data: &SecretData,
        settings: &ConnectionSettings,
        namespace: &str,
        secret_name: &str,
    ) -> TokenCheck {
        let Some((key, required)) = token_requirements(condition_type) else {
            return TokenCheck::new(
                condition_type,
                ConditionStatus::Unknown,
                REASON_NOT_VALIDATED,
                "no validation defined for this condition type",
                CheckClass::Ready,
            );
        };

        let Some(token) = secret_value(data, key) else {
            return TokenCheck::new(
                condition_type,
                ConditionStatus::False,
                REASON_MISSING,
                format!("token {key} missing in secret {namespace}/{secret_name}"),
                CheckClass::OperatorError,
            );
        };

        // Each token authenticates its own lookup.
        let client = match self.clients.build(settings, token) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Cannot build Dynatrace client");
                return TokenCheck::new(
                    condition_type,
                    ConditionStatus::False,
                    REASON_INVALID_ENDPOINT,
                    e.to_string(),
                    CheckClass::ConfigError,
                );
            }
        };

        debug!(token = %condition_type, api_url = %settings.api_url, "Validating token scopes");
        match validate_scopes(client.as_ref(), token, required, self.config.api_timeout).await {
            Ok(verdict @ ScopeVerdict::Adequate) => TokenCheck::new(
                condition_type,
                ConditionStatus::True,
                REASON_READY,
                verdict.message(),
                CheckClass::Ready,
            ),
            Ok(verdict @ ScopeVerdict::Rejected) => TokenCheck::new(
                condition_type,
                ConditionStatus::False,
                REASON_UNAUTHORIZED,
                verdict.message(),
                CheckClass::Rejected,
            ),
            Ok(verdict @ ScopeVerdict::MissingScope(_)) => TokenCheck::new(
                condition_type,
                ConditionStatus::False,
                REASON_SCOPE_MISSING,
                verdict.message(),
                CheckClass::Rejected,
            ),
            Err(e) => {
                warn!(token = %condition_type, error = %e, "Token validation failed");
                TokenCheck::new(
                    condition_type,
                    ConditionStatus::Unknown,
                    REASON_ERROR,
                    format!("validation incomplete: {e}"),
                    CheckClass::Transient,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_value_ignores_blank_and_invalid_utf8() {
        let mut data = SecretData::new();
        data.insert("paasToken".to_string(), b" 42\n".to_vec());
        data.insert("apiToken".to_string(), b"   ".to_vec());
        data.insert("binary".to_string(), vec![0xff, 0xfe]);

        assert_eq!(secret_value(&data, "paasToken"), Some("42"));
        assert_eq!(secret_value(&data, "apiToken"), None);
        assert_eq!(secret_value(&data, "binary"), None);
        assert_eq!(secret_value(&data, "missing"), None);
    }

    #[test]
    fn test_token_requirements() {
        assert_eq!(
            token_requirements(&ConditionType::PaaSToken),
            Some(("paasToken", &["InstallerDownload"][..]))
        );
        assert_eq!(
            token_requirements(&ConditionType::ApiToken),
            Some(("apiToken", &["DataExport"][..]))
        );
        assert!(token_requirements(&ConditionType::Other("Custom".to_string())).is_none());
    }
}
