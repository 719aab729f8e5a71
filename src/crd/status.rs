//! # OneAgentAPM Status
//!
//! Status types and the condition store.
//!
//! Conditions are held in a map keyed by condition type so there is never more
//! than one entry per type. On the wire they are a list sorted by type name,
//! which keeps serialized status stable regardless of the order in which the
//! reconciler touched the entries.

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Status of the OneAgentAPM resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OneAgentApmStatus {
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Conditions,
    /// Generation of the spec the conditions were computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Name of the secret the tokens were read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<String>,
}

/// Type of a condition
///
/// Types the controller does not know about are preserved as `Other`.
/// Equality, hashing and ordering all go by the rendered name.
#[derive(Debug, Clone)]
pub enum ConditionType {
    /// The PaaS token can download installers
    PaaSToken,
    /// The API token can export data
    ApiToken,
    Other(String),
}

impl ConditionType {
    /// Condition types tracked for every OneAgentAPM resource
    pub const TOKEN_TYPES: [ConditionType; 2] = [ConditionType::PaaSToken, ConditionType::ApiToken];

    pub fn as_str(&self) -> &str {
        match self {
            ConditionType::PaaSToken => "PaaSToken",
            ConditionType::ApiToken => "APIToken",
            ConditionType::Other(name) => name,
        }
    }
}

impl From<&str> for ConditionType {
    fn from(value: &str) -> Self {
        match value {
            "PaaSToken" => ConditionType::PaaSToken,
            "APIToken" => ConditionType::ApiToken,
            other => ConditionType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq for ConditionType {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for ConditionType {}

impl Hash for ConditionType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl Ord for ConditionType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for ConditionType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for ConditionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConditionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(ConditionType::from(value.as_str()))
    }
}

impl JsonSchema for ConditionType {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("ConditionType")
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        schemars::json_schema!({
            "type": "string",
            "description": "Type of condition, e.g. PaaSToken or APIToken"
        })
    }
}

/// Status of a condition (True, False, Unknown)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        };
        f.write_str(value)
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: ConditionType,
    /// Status of the condition
    pub status: ConditionStatus,
    /// Machine-readable reason for the condition's last update
    #[serde(default)]
    pub reason: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Last time the status changed (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
}

/// Set of conditions, at most one per type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions(BTreeMap<ConditionType, Condition>);

impl Conditions {
    pub fn get(&self, condition_type: &ConditionType) -> Option<&Condition> {
        self.0.get(condition_type)
    }

    /// Conditions in serialization order (sorted by type name)
    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set a condition, refreshing `lastTransitionTime` only when the status changes
    ///
    /// Returns true if anything about the stored condition changed.
    pub fn set_condition(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: &str,
        message: &str,
    ) -> bool {
        self.set_condition_at(condition_type, status, reason, message, Utc::now())
    }

    /// Same as [`Conditions::set_condition`] with an explicit clock reading
    pub fn set_condition_at(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let last_transition_time = match self.0.get(&condition_type) {
            Some(existing) if existing.status == status => existing.last_transition_time.clone(),
            _ => Some(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
        };

        let condition = Condition {
            r#type: condition_type.clone(),
            status,
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time,
        };

        if self.0.get(&condition_type) == Some(&condition) {
            return false;
        }
        self.0.insert(condition_type, condition);
        true
    }

    /// Record `Unknown` for a type that has no entry yet
    pub fn ensure_condition(&mut self, condition_type: ConditionType, reason: &str, message: &str) -> bool {
        if self.0.contains_key(&condition_type) {
            return false;
        }
        self.set_condition(condition_type, ConditionStatus::Unknown, reason, message)
    }

    pub fn is_true_for(&self, condition_type: &ConditionType) -> bool {
        self.status_of(condition_type) == Some(ConditionStatus::True)
    }

    pub fn is_false_for(&self, condition_type: &ConditionType) -> bool {
        self.status_of(condition_type) == Some(ConditionStatus::False)
    }

    /// An absent condition counts as unknown
    pub fn is_unknown_for(&self, condition_type: &ConditionType) -> bool {
        matches!(
            self.status_of(condition_type),
            None | Some(ConditionStatus::Unknown)
        )
    }

    fn status_of(&self, condition_type: &ConditionType) -> Option<ConditionStatus> {
        self.0.get(condition_type).map(|c| c.status)
    }
}

impl FromIterator<Condition> for Conditions {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        // Later entries win on duplicate types
        Self(iter.into_iter().map(|c| (c.r#type.clone(), c)).collect())
    }
}

impl Serialize for Conditions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.values())
    }
}

impl<'de> Deserialize<'de> for Conditions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let list = Vec::<Condition>::deserialize(deserializer)?;
        Ok(list.into_iter().collect())
    }
}

impl JsonSchema for Conditions {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("Conditions")
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        <Vec<Condition>>::json_schema(generator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_set_condition_creates_entry_with_transition_time() {
        let mut conditions = Conditions::default();
        let changed = conditions.set_condition_at(
            ConditionType::PaaSToken,
            ConditionStatus::True,
            "TokenReady",
            "Ready",
            at(1),
        );

        assert!(changed);
        let condition = conditions.get(&ConditionType::PaaSToken).unwrap();
        assert_eq!(condition.status, ConditionStatus::True);
        assert_eq!(condition.reason, "TokenReady");
        assert_eq!(
            condition.last_transition_time.as_deref(),
            Some("2026-10-16T01:00:00Z")
        );
    }

    #[test]
    fn test_message_only_change_keeps_transition_time() {
        let mut conditions = Conditions::default();
        conditions.set_condition_at(
            ConditionType::PaaSToken,
            ConditionStatus::False,
            "TokenScopeMissing",
            "missing scope: InstallerDownload",
            at(1),
        );
        let changed = conditions.set_condition_at(
            ConditionType::PaaSToken,
            ConditionStatus::False,
            "TokenUnauthorized",
            "token rejected",
            at(2),
        );

        assert!(changed);
        let condition = conditions.get(&ConditionType::PaaSToken).unwrap();
        assert_eq!(condition.reason, "TokenUnauthorized");
        assert_eq!(
            condition.last_transition_time.as_deref(),
            Some("2026-10-16T01:00:00Z")
        );
    }

    #[test]
    fn test_status_change_refreshes_transition_time() {
        let mut conditions = Conditions::default();
        conditions.set_condition_at(
            ConditionType::ApiToken,
            ConditionStatus::Unknown,
            "NotValidated",
            "",
            at(1),
        );
        conditions.set_condition_at(
            ConditionType::ApiToken,
            ConditionStatus::True,
            "TokenReady",
            "Ready",
            at(3),
        );

        assert_eq!(
            conditions
                .get(&ConditionType::ApiToken)
                .unwrap()
                .last_transition_time
                .as_deref(),
            Some("2026-10-16T03:00:00Z")
        );
    }

    #[test]
    fn test_identical_set_reports_no_change() {
        let mut conditions = Conditions::default();
        conditions.set_condition_at(
            ConditionType::PaaSToken,
            ConditionStatus::True,
            "TokenReady",
            "Ready",
            at(1),
        );
        let before = conditions.clone();
        let changed = conditions.set_condition_at(
            ConditionType::PaaSToken,
            ConditionStatus::True,
            "TokenReady",
            "Ready",
            at(5),
        );

        assert!(!changed);
        assert_eq!(conditions, before);
    }

    #[test]
    fn test_predicates_on_absent_type() {
        let conditions = Conditions::default();
        assert!(!conditions.is_true_for(&ConditionType::PaaSToken));
        assert!(!conditions.is_false_for(&ConditionType::PaaSToken));
        assert!(conditions.is_unknown_for(&ConditionType::PaaSToken));
    }

    #[test]
    fn test_predicates_match_stored_status() {
        let mut conditions = Conditions::default();
        conditions.set_condition(ConditionType::PaaSToken, ConditionStatus::True, "TokenReady", "Ready");
        conditions.set_condition(
            ConditionType::ApiToken,
            ConditionStatus::False,
            "TokenUnauthorized",
            "token rejected",
        );

        assert!(conditions.is_true_for(&ConditionType::PaaSToken));
        assert!(!conditions.is_unknown_for(&ConditionType::PaaSToken));
        assert!(conditions.is_false_for(&ConditionType::ApiToken));
        assert!(!conditions.is_true_for(&ConditionType::ApiToken));
    }

    #[test]
    fn test_ensure_condition_only_seeds_missing_types() {
        let mut conditions = Conditions::default();
        conditions.set_condition(ConditionType::PaaSToken, ConditionStatus::True, "TokenReady", "Ready");

        assert!(!conditions.ensure_condition(ConditionType::PaaSToken, "NotValidated", ""));
        assert!(conditions.ensure_condition(ConditionType::ApiToken, "NotValidated", ""));
        assert!(conditions.is_true_for(&ConditionType::PaaSToken));
        assert!(conditions.is_unknown_for(&ConditionType::ApiToken));
        assert_eq!(conditions.len(), 2);
    }

    #[test]
    fn test_serialization_is_sorted_by_type_name() {
        let mut conditions = Conditions::default();
        conditions.set_condition_at(ConditionType::PaaSToken, ConditionStatus::True, "TokenReady", "Ready", at(1));
        conditions.set_condition_at(
            ConditionType::Other("Ready".to_string()),
            ConditionStatus::True,
            "Reconciled",
            "",
            at(1),
        );
        conditions.set_condition_at(ConditionType::ApiToken, ConditionStatus::Unknown, "NotValidated", "", at(1));

        let value = serde_json::to_value(&conditions).unwrap();
        let types: Vec<&str> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["type"].as_str().unwrap())
            .collect();
        assert_eq!(types, vec!["APIToken", "PaaSToken", "Ready"]);
    }

    #[test]
    fn test_deserialize_collapses_duplicate_types() {
        let value = serde_json::json!([
            {"type": "PaaSToken", "status": "False", "reason": "TokenMissing", "message": ""},
            {"type": "PaaSToken", "status": "True", "reason": "TokenReady", "message": "Ready",
             "lastTransitionTime": "2026-10-16T01:00:00Z"}
        ]);
        let conditions: Conditions = serde_json::from_value(value).unwrap();

        assert_eq!(conditions.len(), 1);
        assert!(conditions.is_true_for(&ConditionType::PaaSToken));
    }

    #[test]
    fn test_unknown_condition_types_are_preserved() {
        let value = serde_json::json!([
            {"type": "Ready", "status": "True", "reason": "Reconciled", "message": ""}
        ]);
        let conditions: Conditions = serde_json::from_value(value.clone()).unwrap();

        assert!(conditions.is_true_for(&ConditionType::from("Ready")));
        let round_trip = serde_json::to_value(&conditions).unwrap();
        assert_eq!(round_trip[0]["type"], "Ready");
    }

    #[test]
    fn test_other_variant_with_known_name_is_the_known_type() {
        use std::collections::HashSet;

        let spelled_out = ConditionType::Other("PaaSToken".to_string());
        assert_eq!(spelled_out, ConditionType::PaaSToken);
        assert_eq!(spelled_out.cmp(&ConditionType::PaaSToken), std::cmp::Ordering::Equal);
        assert_ne!(ConditionType::Other("Ready".to_string()), ConditionType::PaaSToken);

        let types: HashSet<_> = [spelled_out.clone(), ConditionType::PaaSToken].into();
        assert_eq!(types.len(), 1);

        let mut conditions = Conditions::default();
        conditions.set_condition_at(
            spelled_out,
            ConditionStatus::True,
            "TokenReady",
            "",
            at(10),
        );
        assert!(conditions.is_true_for(&ConditionType::PaaSToken));
        assert_eq!(conditions.len(), 1);
    }
}
