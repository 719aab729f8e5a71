//! # Status Computation
//!
//! Folds token checks into the status of a fetched resource.

use super::tokens::{TokenCheck, REASON_NOT_VALIDATED};
use crate::crd::{ConditionType, OneAgentApm, OneAgentApmStatus};

/// Status the resource should carry after this reconciliation
///
/// `checks` is `None` when token validation is disabled for the resource, in
/// which case existing token conditions are left untouched.
pub(crate) fn compute_status(agent: &OneAgentApm, checks: Option<&[TokenCheck]>) -> OneAgentApmStatus {
    let mut status = agent.status.clone().unwrap_or_default();
    status.observed_generation = agent.metadata.generation;

    let Some(checks) = checks else {
        return status;
    };

    status.tokens = Some(agent.tokens_secret_name());

    for check in checks {
        status.conditions.set_condition(
            check.condition_type.clone(),
            check.status,
            check.reason,
            &check.message,
        );
    }

    for condition_type in ConditionType::TOKEN_TYPES {
        status.conditions.ensure_condition(
            condition_type,
            REASON_NOT_VALIDATED,
            "token is not validated by this controller",
        );
    }

    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::reconciler::tokens::{CheckClass, REASON_READY};
    use crate::crd::{ConditionStatus, OneAgentApmSpec};

    fn agent() -> OneAgentApm {
        let mut agent = OneAgentApm::new(
            "oneagent",
            OneAgentApmSpec {
                api_url: "https://ENVIRONMENTID.live.dynatrace.com/api".to_string(),
                tokens: None,
                update_token_policy: true,
                skip_cert_check: false,
                proxy: None,
            },
        );
        agent.metadata.namespace = Some("dynatrace".to_string());
        agent.metadata.generation = Some(3);
        agent
    }

    fn ready_paas() -> TokenCheck {
        TokenCheck {
            condition_type: ConditionType::PaaSToken,
            status: ConditionStatus::True,
            reason: REASON_READY,
            message: "Ready".to_string(),
            class: CheckClass::Ready,
        }
    }

    #[test]
    fn test_unchecked_types_are_seeded_unknown() {
        let status = compute_status(&agent(), Some(&[ready_paas()]));

        assert!(status.conditions.is_true_for(&ConditionType::PaaSToken));
        let api = status.conditions.get(&ConditionType::ApiToken).unwrap();
        assert_eq!(api.status, ConditionStatus::Unknown);
        assert_eq!(api.reason, REASON_NOT_VALIDATED);
        assert_eq!(status.observed_generation, Some(3));
        assert_eq!(status.tokens.as_deref(), Some("oneagent"));
    }

    #[test]
    fn test_recomputing_is_stable() {
        let mut agent = agent();
        let first = compute_status(&agent, Some(&[ready_paas()]));
        agent.status = Some(first.clone());

        let second = compute_status(&agent, Some(&[ready_paas()]));
        assert_eq!(first, second);
    }

    #[test]
    fn test_disabled_policy_keeps_conditions() {
        let mut agent = agent();
        let mut previous = OneAgentApmStatus::default();
        previous.conditions.set_condition(
            ConditionType::PaaSToken,
            ConditionStatus::False,
            "TokenUnauthorized",
            "token rejected",
        );
        agent.status = Some(previous.clone());

        let status = compute_status(&agent, None);
        assert_eq!(status.conditions, previous.conditions);
        assert!(status.conditions.get(&ConditionType::ApiToken).is_none());
    }
}
