//! ABAC policy definitions.
//!
//! A policy is a set of rules plus optional target conditions that decide
//! whether the policy applies to a request at all. Each rule combines one
//! or more attribute conditions with a logical operator and carries an
//! allow or deny effect.
//!
//! Constructors validate structure eagerly. The engine validates again at
//! registration because policies can also arrive through serde.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attributes::AttrValue;
use crate::error::{AbacError, Result};

// ============================================================================
// Effect
// ============================================================================

/// The effect of a rule: allow or deny access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Effect {
    /// Grant access.
    Allow,
    /// Deny access.
    Deny,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl TryFrom<String> for Effect {
    type Error = AbacError;

    fn try_from(value: String) -> Result<Self> {
        match value.as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            _ => Err(AbacError::validation(format!(
                "invalid effect '{value}', expected 'allow' or 'deny'"
            ))),
        }
    }
}

impl From<Effect> for String {
    fn from(effect: Effect) -> Self {
        effect.as_str().to_string()
    }
}

// ============================================================================
// Operator
// ============================================================================

/// A comparison operator applied by one condition.
///
/// Unrecognized operator names deserialize into [`Operator::Unsupported`]
/// rather than failing, so a policy written for a newer engine still loads;
/// such conditions never match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    In,
    NotIn,
    Regex,
    StartsWith,
    EndsWith,
    Unsupported(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Regex => "regex",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Unsupported(name) => name,
        }
    }
}

impl From<String> for Operator {
    fn from(name: String) -> Self {
        match name.as_str() {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "contains" => Self::Contains,
            "not_contains" => Self::NotContains,
            "in" => Self::In,
            "not_in" => Self::NotIn,
            "regex" => Self::Regex,
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            _ => Self::Unsupported(name),
        }
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// LogicalOperator
// ============================================================================

/// How a rule combines its condition results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    /// Every condition must hold.
    #[default]
    #[serde(alias = "AND")]
    And,
    /// At least one condition must hold.
    #[serde(alias = "OR")]
    Or,
    /// Negated conjunction: matches unless every condition holds.
    #[serde(alias = "NOT")]
    Not,
}

// ============================================================================
// CombiningAlgorithm
// ============================================================================

/// How a policy's decision interacts with the other applicable policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombiningAlgorithm {
    /// An allow from this policy ends evaluation.
    FirstApplicable,
    /// A deny from this policy ends evaluation with an overall deny.
    #[default]
    DenyOverrides,
    /// Never ends evaluation early.
    PermitOverrides,
}

// ============================================================================
// AttributeCondition
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

/// A single comparison between a request attribute and an expected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeCondition {
    /// Qualified (`"subject.role"`) or bare (`"role"`) attribute name.
    pub attribute_name: String,
    pub operator: Operator,
    pub expected_value: AttrValue,
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    /// Informational only; never changes whether the condition matches.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl AttributeCondition {
    /// Creates a case-sensitive condition with weight 1.0.
    pub fn new(attribute_name: &str, operator: Operator, expected_value: impl Into<AttrValue>) -> Self {
        Self {
            attribute_name: attribute_name.to_string(),
            operator,
            expected_value: expected_value.into(),
            case_sensitive: true,
            weight: 1.0,
        }
    }

    /// Makes string comparisons case-insensitive.
    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    /// Sets the weight. Fails unless the weight is finite and positive.
    pub fn with_weight(mut self, weight: f64) -> Result<Self> {
        self.weight = weight;
        self.validate()?;
        Ok(self)
    }

    /// Checks the structural invariants of this condition.
    pub fn validate(&self) -> Result<()> {
        if self.attribute_name.trim().is_empty() {
            return Err(AbacError::validation("condition attribute_name is empty"));
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(AbacError::validation(format!(
                "condition on '{}' has non-positive weight {}",
                self.attribute_name, self.weight
            )));
        }
        Ok(())
    }
}

// ============================================================================
// AbacRule
// ============================================================================

/// A single access control rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbacRule {
    pub rule_id: String,
    pub effect: Effect,
    /// Never empty for a valid rule.
    pub conditions: Vec<AttributeCondition>,
    #[serde(default)]
    pub logical_operator: LogicalOperator,
    /// Higher values are reported first within a policy.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
}

impl AbacRule {
    /// Creates an enabled AND-rule with priority 0.
    ///
    /// Fails if `conditions` is empty or any condition is invalid.
    pub fn new(rule_id: &str, effect: Effect, conditions: Vec<AttributeCondition>) -> Result<Self> {
        let rule = Self {
            rule_id: rule_id.to_string(),
            effect,
            conditions,
            logical_operator: LogicalOperator::And,
            priority: 0,
            enabled: true,
            description: String::new(),
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Sets the logical operator.
    pub fn with_operator(mut self, logical_operator: LogicalOperator) -> Self {
        self.logical_operator = logical_operator;
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Disables the rule. A disabled rule never matches.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Checks the structural invariants of this rule.
    pub fn validate(&self) -> Result<()> {
        if self.rule_id.trim().is_empty() {
            return Err(AbacError::validation("rule_id is empty"));
        }
        if self.conditions.is_empty() {
            return Err(AbacError::validation(format!(
                "rule '{}' has no conditions",
                self.rule_id
            )));
        }
        self.conditions.iter().try_for_each(AttributeCondition::validate)
    }
}

// ============================================================================
// AbacPolicy
// ============================================================================

/// An Attribute-Based Access Control policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbacPolicy {
    pub policy_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rules: Vec<AbacRule>,
    #[serde(default)]
    pub combining_algorithm: CombiningAlgorithm,
    /// All must hold for the policy to apply. Empty means always applies.
    #[serde(default)]
    pub target_conditions: Vec<AttributeCondition>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Higher values are evaluated first across policies.
    #[serde(default)]
    pub priority: i32,
    /// Attached to the overall decision when this policy allows.
    #[serde(default)]
    pub obligations: Vec<String>,
    #[serde(default)]
    pub advice: Vec<String>,
}

impl AbacPolicy {
    /// Creates an empty, enabled deny-overrides policy with priority 0.
    pub fn new(policy_id: &str, name: &str) -> Self {
        Self {
            policy_id: policy_id.to_string(),
            name: name.to_string(),
            description: String::new(),
            rules: Vec::new(),
            combining_algorithm: CombiningAlgorithm::DenyOverrides,
            target_conditions: Vec::new(),
            enabled: true,
            priority: 0,
            obligations: Vec::new(),
            advice: Vec::new(),
        }
    }

    /// Adds a rule (builder pattern).
    pub fn with_rule(mut self, rule: AbacRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Adds a target condition.
    pub fn with_target(mut self, condition: AttributeCondition) -> Self {
        self.target_conditions.push(condition);
        self
    }

    /// Sets the combining algorithm.
    pub fn with_algorithm(mut self, algorithm: CombiningAlgorithm) -> Self {
        self.combining_algorithm = algorithm;
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Adds an obligation.
    pub fn with_obligation(mut self, obligation: &str) -> Self {
        self.obligations.push(obligation.to_string());
        self
    }

    /// Adds advice.
    pub fn with_advice(mut self, advice: &str) -> Self {
        self.advice.push(advice.to_string());
        self
    }

    /// Disables the policy. Disabled policies are never candidates.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Checks the structural invariants of this policy and all its rules.
    pub fn validate(&self) -> Result<()> {
        if self.policy_id.trim().is_empty() {
            return Err(AbacError::validation("policy_id is empty"));
        }
        self.target_conditions
            .iter()
            .try_for_each(AttributeCondition::validate)?;

        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !seen.insert(rule.rule_id.as_str()) {
                return Err(AbacError::validation(format!(
                    "policy '{}' has duplicate rule_id '{}'",
                    self.policy_id, rule.rule_id
                )));
            }
        }
        Ok(())
    }

    /// Iterates every condition in the policy, target conditions first.
    pub fn all_conditions(&self) -> impl Iterator<Item = &AttributeCondition> {
        self.target_conditions
            .iter()
            .chain(self.rules.iter().flat_map(|r| r.conditions.iter()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn role_is_admin() -> AttributeCondition {
        AttributeCondition::new("subject.role", Operator::Eq, "admin")
    }

    #[test]
    fn test_rule_without_conditions_is_rejected() {
        let result = AbacRule::new("empty", Effect::Allow, vec![]);
        assert!(matches!(result, Err(AbacError::Validation(_))));
    }

    #[test]
    fn test_non_positive_weight_is_rejected() {
        assert!(role_is_admin().with_weight(0.0).is_err());
        assert!(role_is_admin().with_weight(-1.0).is_err());
        assert!(role_is_admin().with_weight(f64::NAN).is_err());
        assert!(role_is_admin().with_weight(0.5).is_ok());
    }

    #[test]
    fn test_invalid_effect_is_rejected() {
        for bad in ["maybe", "permit", "ALLOW", "Deny", ""] {
            let result = Effect::try_from(bad.to_string());
            assert!(
                matches!(result, Err(AbacError::Validation(_))),
                "effect {bad:?} should be rejected"
            );
            assert!(serde_json::from_value::<Effect>(json!(bad)).is_err());
        }
        assert_eq!(Effect::try_from("allow".to_string()).expect("allow"), Effect::Allow);
        assert_eq!(Effect::try_from("deny".to_string()).expect("deny"), Effect::Deny);
    }

    #[test]
    fn test_unknown_operator_deserializes() {
        let op: Operator = serde_json::from_value(json!("sounds_like")).expect("operator");
        assert_eq!(op, Operator::Unsupported("sounds_like".to_string()));
        assert_eq!(serde_json::to_value(&op).expect("serialize"), json!("sounds_like"));
    }

    #[test]
    fn test_policy_rejects_duplicate_rule_ids() {
        let rule = AbacRule::new("r1", Effect::Allow, vec![role_is_admin()]).expect("rule");
        let policy = AbacPolicy::new("p1", "dup")
            .with_rule(rule.clone())
            .with_rule(rule);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_policy_validation_covers_target_conditions() {
        let mut bad = role_is_admin();
        bad.weight = 0.0;
        let policy = AbacPolicy::new("p1", "targets").with_target(bad);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_policy_defaults_from_json() {
        let policy: AbacPolicy = serde_json::from_value(json!({
            "policy_id": "p1",
            "rules": [{
                "rule_id": "r1",
                "effect": "allow",
                "conditions": [{
                    "attribute_name": "subject.role",
                    "operator": "eq",
                    "expected_value": "admin"
                }]
            }]
        }))
        .expect("deserialize policy");

        assert!(policy.enabled);
        assert_eq!(policy.priority, 0);
        assert_eq!(policy.combining_algorithm, CombiningAlgorithm::DenyOverrides);
        let rule = &policy.rules[0];
        assert!(rule.enabled);
        assert_eq!(rule.logical_operator, LogicalOperator::And);
        assert!(rule.conditions[0].case_sensitive);
        assert_eq!(rule.conditions[0].weight, 1.0);
    }

    #[test]
    fn test_all_conditions_includes_targets() {
        let policy = AbacPolicy::new("p1", "all")
            .with_target(AttributeCondition::new("resource.type", Operator::Eq, "doc"))
            .with_rule(AbacRule::new("r1", Effect::Allow, vec![role_is_admin()]).expect("rule"));

        let names: Vec<&str> = policy
            .all_conditions()
            .map(|c| c.attribute_name.as_str())
            .collect();
        assert_eq!(names, vec!["resource.type", "subject.role"]);
    }
}
