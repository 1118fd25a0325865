//! Condition evaluation.
//!
//! Applies one operator to one resolved attribute value. Every failure
//! mode (missing attribute, failed coercion, bad pattern, unknown
//! operator) resolves to `false` so a malformed condition can only ever
//! contribute "does not match".

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::attributes::{AccessRequest, AttrValue};
use crate::config::AbacConfig;
use crate::error::{AbacError, Result};
use crate::policy::{AttributeCondition, Operator};

// ============================================================================
// Patterns
// ============================================================================

/// Regex patterns compiled at registration time, keyed by source text.
///
/// The `regex` crate guarantees linear-time matching; the size limit and
/// length cap bound the compiled program so a hostile pattern cannot
/// blow up memory or compile time either.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    compiled: HashMap<String, Regex>,
}

impl PatternSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles every regex condition in `conditions`.
    ///
    /// Fails on the first pattern that is not a string, is too long, or
    /// does not compile within the configured size limit.
    pub fn compile_all<'a>(
        &mut self,
        conditions: impl IntoIterator<Item = &'a AttributeCondition>,
        config: &AbacConfig,
    ) -> Result<()> {
        for condition in conditions {
            if condition.operator != Operator::Regex {
                continue;
            }
            let pattern = condition.expected_value.as_str().ok_or_else(|| {
                AbacError::InvalidPattern {
                    attribute: condition.attribute_name.clone(),
                    pattern: condition.expected_value.to_string(),
                    reason: format!(
                        "expected a string pattern, got {}",
                        condition.expected_value.type_name()
                    ),
                }
            })?;
            if self.compiled.contains_key(pattern) {
                continue;
            }
            let regex = compile_pattern(pattern, config).map_err(|reason| {
                AbacError::InvalidPattern {
                    attribute: condition.attribute_name.clone(),
                    pattern: pattern.to_string(),
                    reason,
                }
            })?;
            self.compiled.insert(pattern.to_string(), regex);
        }
        Ok(())
    }

    /// Returns the compiled regex for a pattern, if registered.
    pub fn get(&self, pattern: &str) -> Option<&Regex> {
        self.compiled.get(pattern)
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

/// Compiles one pattern under the configured length and size limits.
pub fn compile_pattern(pattern: &str, config: &AbacConfig) -> std::result::Result<Regex, String> {
    if pattern.len() > config.max_regex_len {
        return Err(format!(
            "pattern is {} bytes, limit is {}",
            pattern.len(),
            config.max_regex_len
        ));
    }
    RegexBuilder::new(pattern)
        .size_limit(config.regex_size_limit)
        .dfa_size_limit(config.regex_size_limit)
        .build()
        .map_err(|e| e.to_string())
}

// ============================================================================
// Evaluation
// ============================================================================

/// Evaluates one condition against a request.
///
/// Regex conditions use the pre-compiled pattern from `patterns`. A pattern
/// that was never registered is compiled on the spot with default limits;
/// if that fails the condition is false and a warning is logged.
pub fn evaluate_condition(
    condition: &AttributeCondition,
    request: &AccessRequest,
    patterns: &PatternSet,
) -> bool {
    let Some(actual) = request.resolve(&condition.attribute_name) else {
        debug!(
            attribute = %condition.attribute_name,
            request_id = %request.request_id,
            "Attribute missing, condition does not match"
        );
        return false;
    };

    let expected = &condition.expected_value;
    let cs = condition.case_sensitive;

    match &condition.operator {
        Operator::Eq => actual.loosely_equals(expected, cs),
        Operator::Ne => !actual.loosely_equals(expected, cs),
        Operator::Gt => compare_numeric(actual, expected, |a, b| a > b),
        Operator::Gte => compare_numeric(actual, expected, |a, b| a >= b),
        Operator::Lt => compare_numeric(actual, expected, |a, b| a < b),
        Operator::Lte => compare_numeric(actual, expected, |a, b| a <= b),
        Operator::Contains => compare_text(actual, expected, cs, |a, b| a.contains(b)),
        Operator::NotContains => !compare_text(actual, expected, cs, |a, b| a.contains(b)),
        Operator::StartsWith => compare_text(actual, expected, cs, |a, b| a.starts_with(b)),
        Operator::EndsWith => compare_text(actual, expected, cs, |a, b| a.ends_with(b)),
        Operator::In => membership(actual, expected, cs).unwrap_or(false),
        Operator::NotIn => membership(actual, expected, cs).is_some_and(|found| !found),
        Operator::Regex => match_regex(condition, actual, patterns),
        Operator::Unsupported(name) => {
            warn!(
                operator = %name,
                attribute = %condition.attribute_name,
                "Unsupported operator, condition does not match"
            );
            false
        }
    }
}

/// Both operands must coerce to a non-NaN float.
fn compare_numeric(actual: &AttrValue, expected: &AttrValue, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) if !a.is_nan() && !b.is_nan() => cmp(a, b),
        _ => {
            debug!(
                actual_type = actual.type_name(),
                expected_type = expected.type_name(),
                "Numeric coercion failed, condition does not match"
            );
            false
        }
    }
}

fn compare_text(
    actual: &AttrValue,
    expected: &AttrValue,
    case_sensitive: bool,
    cmp: impl Fn(&str, &str) -> bool,
) -> bool {
    let (a, b) = (actual.to_string(), expected.to_string());
    if case_sensitive {
        cmp(&a, &b)
    } else {
        cmp(&a.to_lowercase(), &b.to_lowercase())
    }
}

/// Returns `None` when `expected` is not a collection.
fn membership(actual: &AttrValue, expected: &AttrValue, case_sensitive: bool) -> Option<bool> {
    if let Some(items) = expected.as_list() {
        return Some(items.iter().any(|item| actual.loosely_equals(item, case_sensitive)));
    }
    match (actual, expected) {
        (AttrValue::String(a), AttrValue::String(b)) => Some(if case_sensitive {
            b.contains(a.as_str())
        } else {
            b.to_lowercase().contains(&a.to_lowercase())
        }),
        _ => None,
    }
}

fn match_regex(condition: &AttributeCondition, actual: &AttrValue, patterns: &PatternSet) -> bool {
    let Some(pattern) = condition.expected_value.as_str() else {
        warn!(
            attribute = %condition.attribute_name,
            "Regex condition without a string pattern, condition does not match"
        );
        return false;
    };

    let haystack = actual.to_string();
    if let Some(regex) = patterns.get(pattern) {
        return regex.is_match(&haystack);
    }

    match compile_pattern(pattern, &AbacConfig::default()) {
        Ok(regex) => regex.is_match(&haystack),
        Err(reason) => {
            warn!(
                attribute = %condition.attribute_name,
                pattern = %pattern,
                %reason,
                "Regex failed to compile, condition does not match"
            );
            false
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn request() -> AccessRequest {
        AccessRequest::new("req")
            .subject("role", "Admin")
            .subject("clearance", 2)
            .subject("groups", vec!["eng", "ops"])
            .resource("path", "/finance/reports/q3.pdf")
            .resource("size", "1024")
            .environment("country", "DE")
    }

    fn check(condition: AttributeCondition) -> bool {
        evaluate_condition(&condition, &request(), &PatternSet::new())
    }

    #[test]
    fn test_eq_respects_case_sensitivity() {
        let cond = AttributeCondition::new("subject.role", Operator::Eq, "admin");
        assert!(!check(cond.clone()));
        assert!(check(cond.case_insensitive()));
    }

    #[test]
    fn test_ne_respects_case_sensitivity() {
        let cond = AttributeCondition::new("subject.role", Operator::Ne, "admin");
        assert!(check(cond.clone()));
        assert!(!check(cond.case_insensitive()));
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        for op in [Operator::Eq, Operator::Ne, Operator::NotIn, Operator::NotContains] {
            let cond = AttributeCondition::new("subject.missing", op, "x");
            assert!(!check(cond));
        }
    }

    #[test_case(Operator::Gt, 1, true; "gt")]
    #[test_case(Operator::Gt, 2, false; "gt equal")]
    #[test_case(Operator::Gte, 2, true; "gte equal")]
    #[test_case(Operator::Lt, 3, true; "lt")]
    #[test_case(Operator::Lte, 1, false; "lte below")]
    fn test_numeric_operators(op: Operator, expected: i64, result: bool) {
        let cond = AttributeCondition::new("subject.clearance", op, expected);
        assert_eq!(check(cond), result);
    }

    #[test]
    fn test_numeric_coerces_strings() {
        let cond = AttributeCondition::new("resource.size", Operator::Gte, 1000.5);
        assert!(check(cond));
    }

    #[test]
    fn test_numeric_coercion_failure_is_false() {
        let cond = AttributeCondition::new("subject.role", Operator::Gt, 1);
        assert!(!check(cond));
        let cond = AttributeCondition::new("subject.clearance", Operator::Lt, "high");
        assert!(!check(cond));
    }

    #[test_case(Operator::Contains, "reports", true; "contains")]
    #[test_case(Operator::Contains, "REPORTS", false; "contains case")]
    #[test_case(Operator::NotContains, "payroll", true; "not contains")]
    #[test_case(Operator::StartsWith, "/finance/", true; "starts with")]
    #[test_case(Operator::EndsWith, ".pdf", true; "ends with")]
    #[test_case(Operator::EndsWith, ".doc", false; "ends with miss")]
    fn test_text_operators(op: Operator, expected: &str, result: bool) {
        let cond = AttributeCondition::new("resource.path", op, expected);
        assert_eq!(check(cond), result);
    }

    #[test]
    fn test_text_operators_case_insensitive() {
        let cond = AttributeCondition::new("resource.path", Operator::Contains, "REPORTS")
            .case_insensitive();
        assert!(check(cond));
    }

    #[test]
    fn test_in_list() {
        let cond = AttributeCondition::new("environment.country", Operator::In, vec!["DE", "FR"]);
        assert!(check(cond));
        let cond = AttributeCondition::new("environment.country", Operator::NotIn, vec!["US"]);
        assert!(check(cond));
        let cond = AttributeCondition::new("environment.country", Operator::In, vec!["de"])
            .case_insensitive();
        assert!(check(cond));
    }

    #[test]
    fn test_in_json_array() {
        let cond = AttributeCondition::new(
            "subject.clearance",
            Operator::In,
            AttrValue::Json(json!([1, 2, 3])),
        );
        assert!(check(cond));
    }

    #[test]
    fn test_in_string_is_substring_membership() {
        let cond = AttributeCondition::new("environment.country", Operator::In, "AT,CH,DE");
        assert!(check(cond));
    }

    #[test]
    fn test_in_non_collection_is_false_both_ways() {
        let cond = AttributeCondition::new("subject.clearance", Operator::In, 2);
        assert!(!check(cond));
        let cond = AttributeCondition::new("subject.clearance", Operator::NotIn, 5);
        assert!(!check(cond));
    }

    #[test]
    fn test_regex_uses_precompiled_pattern() {
        let cond = AttributeCondition::new("resource.path", Operator::Regex, r"^/finance/.*\.pdf$");
        let mut patterns = PatternSet::new();
        patterns
            .compile_all([&cond], &AbacConfig::default())
            .expect("compile");
        assert_eq!(patterns.len(), 1);
        assert!(evaluate_condition(&cond, &request(), &patterns));
    }

    #[test]
    fn test_regex_is_unanchored_search() {
        let cond = AttributeCondition::new("resource.path", Operator::Regex, "reports");
        assert!(check(cond));
    }

    #[test]
    fn test_invalid_regex_is_false_at_evaluation() {
        let cond = AttributeCondition::new("resource.path", Operator::Regex, "([unclosed");
        assert!(!check(cond));
    }

    #[test]
    fn test_invalid_regex_is_rejected_at_compile() {
        let cond = AttributeCondition::new("resource.path", Operator::Regex, "([unclosed");
        let result = PatternSet::new().compile_all([&cond], &AbacConfig::default());
        assert!(matches!(result, Err(AbacError::InvalidPattern { .. })));
    }

    #[test]
    fn test_oversized_regex_is_rejected_at_compile() {
        let config = AbacConfig {
            max_regex_len: 8,
            ..AbacConfig::default()
        };
        let cond = AttributeCondition::new("resource.path", Operator::Regex, "a".repeat(9));
        let result = PatternSet::new().compile_all([&cond], &config);
        assert!(matches!(result, Err(AbacError::InvalidPattern { .. })));
    }

    #[test]
    fn test_regex_size_limit_is_enforced() {
        let config = AbacConfig {
            regex_size_limit: 1024,
            ..AbacConfig::default()
        };
        assert!(compile_pattern(r"\w{1000}", &config).is_err());
    }

    #[test]
    fn test_non_string_regex_is_rejected_at_compile() {
        let cond = AttributeCondition::new("resource.path", Operator::Regex, 42);
        let result = PatternSet::new().compile_all([&cond], &AbacConfig::default());
        assert!(matches!(result, Err(AbacError::InvalidPattern { .. })));
    }

    #[test]
    fn test_unsupported_operator_is_false() {
        let cond = AttributeCondition::new(
            "subject.role",
            Operator::Unsupported("sounds_like".to_string()),
            "Admin",
        );
        assert!(!check(cond));
    }

    #[test]
    fn test_contains_on_list_uses_string_form() {
        let cond = AttributeCondition::new("subject.groups", Operator::Contains, "ops");
        assert!(check(cond));
    }
}
