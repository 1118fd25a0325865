#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tessera_abac::{
    AbacConfig, AbacEngine, AbacPolicy, AbacRule, AccessRequest, AttrValue, AttributeCondition,
    CombiningAlgorithm, Decision, Effect, LogicalOperator, Operator, PolicyDecision,
};

// ============================================================================
// Arbitrary Inputs
// ============================================================================

/// Small attribute vocabulary so generated conditions actually hit the
/// generated request.
const NAMES: [&str; 8] = [
    "subject.role",
    "subject.clearance",
    "resource.owner",
    "resource.tags",
    "action.verb",
    "environment.hour",
    "role",
    "context.score",
];

#[derive(Debug, Clone, Arbitrary)]
enum FuzzValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl From<&FuzzValue> for AttrValue {
    fn from(v: &FuzzValue) -> Self {
        match v {
            FuzzValue::Str(s) => AttrValue::from(s.as_str()),
            FuzzValue::Int(i) => AttrValue::Int(*i),
            FuzzValue::Float(f) => AttrValue::Float(*f),
            FuzzValue::Bool(b) => AttrValue::Bool(*b),
            FuzzValue::List(items) => AttrValue::from(items.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum FuzzOperator {
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
    Unknown,
}

impl From<FuzzOperator> for Operator {
    fn from(op: FuzzOperator) -> Self {
        match op {
            FuzzOperator::Eq => Operator::Eq,
            FuzzOperator::Ne => Operator::Ne,
            FuzzOperator::Gt => Operator::Gt,
            FuzzOperator::Gte => Operator::Gte,
            FuzzOperator::Lt => Operator::Lt,
            FuzzOperator::Lte => Operator::Lte,
            FuzzOperator::Contains => Operator::Contains,
            FuzzOperator::NotContains => Operator::NotContains,
            FuzzOperator::In => Operator::In,
            FuzzOperator::NotIn => Operator::NotIn,
            FuzzOperator::Regex => Operator::Regex,
            FuzzOperator::StartsWith => Operator::StartsWith,
            FuzzOperator::EndsWith => Operator::EndsWith,
            FuzzOperator::Unknown => Operator::Unsupported("fuzz".to_string()),
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzCondition {
    name: u8,
    operator: FuzzOperator,
    value: FuzzValue,
    case_sensitive: bool,
}

impl FuzzCondition {
    fn to_condition(&self) -> AttributeCondition {
        let name = NAMES[self.name as usize % NAMES.len()];
        let mut cond = AttributeCondition::new(name, self.operator.into(), &self.value);
        cond.case_sensitive = self.case_sensitive;
        cond
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzRule {
    deny: bool,
    logic: u8,
    conditions: Vec<FuzzCondition>,
    priority: i8,
    enabled: bool,
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzPolicy {
    algorithm: u8,
    priority: i8,
    enabled: bool,
    targets: Vec<FuzzCondition>,
    rules: Vec<FuzzRule>,
}

impl FuzzPolicy {
    /// Builds a policy; rules without conditions are rejected here
    /// exactly as registration would reject them.
    fn to_policy(&self, id: usize) -> Option<AbacPolicy> {
        let algorithm = match self.algorithm % 3 {
            0 => CombiningAlgorithm::FirstApplicable,
            1 => CombiningAlgorithm::DenyOverrides,
            _ => CombiningAlgorithm::PermitOverrides,
        };
        let mut policy = AbacPolicy::new(&format!("policy-{id}"), "fuzz")
            .with_algorithm(algorithm)
            .with_priority(i32::from(self.priority));
        policy.enabled = self.enabled;
        for target in &self.targets {
            policy = policy.with_target(target.to_condition());
        }
        for (i, r) in self.rules.iter().enumerate() {
            let effect = if r.deny { Effect::Deny } else { Effect::Allow };
            let logic = match r.logic % 3 {
                0 => LogicalOperator::And,
                1 => LogicalOperator::Or,
                _ => LogicalOperator::Not,
            };
            let conditions = r.conditions.iter().map(FuzzCondition::to_condition).collect();
            let mut rule = AbacRule::new(&format!("rule-{i}"), effect, conditions)
                .ok()?
                .with_operator(logic)
                .with_priority(i32::from(r.priority));
            rule.enabled = r.enabled;
            policy = policy.with_rule(rule);
        }
        Some(policy)
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzRequest {
    attributes: Vec<(u8, FuzzValue)>,
}

impl FuzzRequest {
    fn to_request(&self) -> AccessRequest {
        self.attributes
            .iter()
            .fold(AccessRequest::new("fuzz"), |req, (name, value)| {
                let name = NAMES[*name as usize % NAMES.len()];
                let value = AttrValue::from(value);
                match name.split_once('.') {
                    Some(("subject", n)) => req.subject(n, value),
                    Some(("resource", n)) => req.resource(n, value),
                    Some(("action", n)) => req.action(n, value),
                    Some(("environment", n)) => req.environment(n, value),
                    Some((_, n)) => req.context(n, value),
                    None => req.subject(name, value),
                }
            })
    }
}

// ============================================================================
// Target
// ============================================================================

fuzz_target!(|input: (Vec<FuzzPolicy>, FuzzRequest)| {
    let (fuzz_policies, fuzz_request) = input;

    let engine = AbacEngine::new(AbacConfig::uncached()).expect("default limits are valid");
    let mut registered = Vec::new();
    for (id, fp) in fuzz_policies.iter().take(16).enumerate() {
        if let Some(policy) = fp.to_policy(id) {
            // Bad regexes are rejected, which is fine
            if engine.register_policy(policy.clone()).is_ok() {
                registered.push(policy);
            }
        }
    }

    let request = fuzz_request.to_request();
    let first = engine.evaluate_access(&request);
    let second = engine.evaluate_access(&request);

    validate_decision_invariants(&registered, &first);
    assert_eq!(first.decision, second.decision, "evaluation must be deterministic");
    assert_eq!(first.matched_rules, second.matched_rules);
    assert_eq!(first.denied_rules, second.denied_rules);
});

/// Validates decision invariants.
///
/// **Invariants checked:**
/// 1. A healthy engine never answers indeterminate
/// 2. Allow carries matched rules, deny carries denied rules, not_applicable carries neither
/// 3. Confidence is the canonical value for the outcome
/// 4. Every evaluated policy is registered and enabled
fn validate_decision_invariants(registered: &[AbacPolicy], decision: &PolicyDecision) {
    assert_ne!(decision.decision, Decision::Indeterminate);

    match decision.decision {
        Decision::Allow => assert!(!decision.matched_rules.is_empty()),
        Decision::Deny => assert!(!decision.denied_rules.is_empty()),
        Decision::NotApplicable => {
            assert!(decision.matched_rules.is_empty());
            assert!(decision.denied_rules.is_empty());
        }
        Decision::Indeterminate => unreachable!(),
    }

    assert!(
        (decision.confidence_score - decision.decision.confidence()).abs() < f64::EPSILON,
        "confidence {} does not match {:?}",
        decision.confidence_score,
        decision.decision
    );

    for id in &decision.evaluated_policies {
        let policy = registered
            .iter()
            .find(|p| &p.policy_id == id)
            .unwrap_or_else(|| panic!("evaluated unknown policy '{id}'"));
        assert!(policy.enabled, "disabled policy '{id}' was evaluated");
    }
}
