//! Rule and policy evaluation.
//!
//! A rule combines its condition results with its logical operator. A
//! policy evaluates its deny rules first: any matching deny rule decides
//! the policy as `Deny`, whatever the policy's combining algorithm. Only
//! when no deny rule matches are the allow rules consulted.

use serde::{Deserialize, Serialize};

use crate::attributes::AccessRequest;
use crate::condition::{PatternSet, evaluate_condition};
use crate::policy::{AbacPolicy, AbacRule, Effect, LogicalOperator};

// ============================================================================
// Decision
// ============================================================================

/// The outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
    /// No rule of any applicable policy matched.
    NotApplicable,
    /// The engine could not evaluate the request consistently.
    Indeterminate,
}

impl Decision {
    /// Canonical confidence score for this outcome.
    pub fn confidence(self) -> f64 {
        match self {
            Self::Allow | Self::Deny => 0.9,
            Self::NotApplicable => 0.5,
            Self::Indeterminate => 0.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::NotApplicable => "not_applicable",
            Self::Indeterminate => "indeterminate",
        }
    }
}

/// The result of evaluating a request against one policy or the whole engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub decision: Decision,
    pub confidence_score: f64,
    /// Allow rules that matched.
    pub matched_rules: Vec<String>,
    /// Deny rules that matched.
    pub denied_rules: Vec<String>,
    pub obligations: Vec<String>,
    pub advice: Vec<String>,
    /// Policies whose rules were evaluated, in evaluation order.
    pub evaluated_policies: Vec<String>,
    pub evaluation_time_ms: f64,
}

impl PolicyDecision {
    /// An empty decision with the canonical confidence for `decision`.
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            confidence_score: decision.confidence(),
            matched_rules: Vec::new(),
            denied_rules: Vec::new(),
            obligations: Vec::new(),
            advice: Vec::new(),
            evaluated_policies: Vec::new(),
            evaluation_time_ms: 0.0,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }

    pub fn is_denied(&self) -> bool {
        self.decision == Decision::Deny
    }
}

// ============================================================================
// Rule Evaluation
// ============================================================================

/// Evaluates one rule against a request.
///
/// - `And`: every condition holds.
/// - `Or`: at least one condition holds.
/// - `Not`: negated conjunction (NAND). With several conditions the rule
///   matches as soon as one of them fails; it does **not** mean "none hold".
///
/// Disabled rules never match. Conditions are visited in order and
/// evaluation short-circuits.
pub fn evaluate_rule(rule: &AbacRule, request: &AccessRequest, patterns: &PatternSet) -> bool {
    if !rule.enabled {
        return false;
    }
    let mut results = rule
        .conditions
        .iter()
        .map(|cond| evaluate_condition(cond, request, patterns));

    match rule.logical_operator {
        LogicalOperator::And => results.all(|r| r),
        LogicalOperator::Or => results.any(|r| r),
        LogicalOperator::Not => !results.all(|r| r),
    }
}

// ============================================================================
// Policy Evaluation
// ============================================================================

/// Evaluates one policy against a request.
///
/// Target conditions are not checked here; the engine filters candidates
/// before calling this.
///
/// # Postcondition
///
/// Exactly one of `matched_rules` / `denied_rules` is non-empty for
/// `Allow` / `Deny`; both are empty for `NotApplicable`.
pub fn evaluate_policy(
    policy: &AbacPolicy,
    request: &AccessRequest,
    patterns: &PatternSet,
) -> PolicyDecision {
    let denied = matching_rules(policy, Effect::Deny, request, patterns);
    if !denied.is_empty() {
        return PolicyDecision {
            denied_rules: denied,
            evaluated_policies: vec![policy.policy_id.clone()],
            ..PolicyDecision::new(Decision::Deny)
        };
    }

    let matched = matching_rules(policy, Effect::Allow, request, patterns);
    if !matched.is_empty() {
        return PolicyDecision {
            matched_rules: matched,
            obligations: policy.obligations.clone(),
            advice: policy.advice.clone(),
            evaluated_policies: vec![policy.policy_id.clone()],
            ..PolicyDecision::new(Decision::Allow)
        };
    }

    PolicyDecision {
        evaluated_policies: vec![policy.policy_id.clone()],
        ..PolicyDecision::new(Decision::NotApplicable)
    }
}

/// Ids of enabled rules with `effect` that match, highest priority first.
fn matching_rules(
    policy: &AbacPolicy,
    effect: Effect,
    request: &AccessRequest,
    patterns: &PatternSet,
) -> Vec<String> {
    let mut rules: Vec<&AbacRule> = policy
        .rules
        .iter()
        .filter(|r| r.effect == effect)
        .collect();
    rules.sort_by(|a, b| b.priority.cmp(&a.priority));

    rules
        .into_iter()
        .filter(|rule| evaluate_rule(rule, request, patterns))
        .map(|rule| rule.rule_id.clone())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
