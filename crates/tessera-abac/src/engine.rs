//! The ABAC engine: policy registry, candidate selection, cross-policy
//! combining, decision caching and statistics.
//!
//! # Concurrency
//!
//! The policy table and index live in an immutable [`Snapshot`] behind
//! `RwLock<Arc<Snapshot>>`. Evaluation clones the `Arc` and drops the lock
//! before doing any work, so readers never block each other or writers for
//! longer than a pointer copy. Writers are serialized by a separate mutex,
//! build a modified copy of the snapshot and swap it in.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::attributes::AccessRequest;
use crate::cache::{CacheStats, DecisionCache};
use crate::condition::{PatternSet, evaluate_condition};
use crate::config::AbacConfig;
use crate::error::{AbacError, Result};
use crate::evaluator::{Decision, PolicyDecision, evaluate_policy};
use crate::index::PolicyIndex;
use crate::policy::{AbacPolicy, CombiningAlgorithm};

// ============================================================================
// Snapshot
// ============================================================================

/// A registered policy with its compiled patterns and registration order.
#[derive(Debug)]
struct RegisteredPolicy {
    policy: AbacPolicy,
    patterns: PatternSet,
    seq: u64,
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    policies: HashMap<String, Arc<RegisteredPolicy>>,
    index: PolicyIndex,
    next_seq: u64,
}

impl Snapshot {
    /// Enabled candidates whose target conditions hold, in evaluation order.
    fn applicable(&self, request: &AccessRequest) -> Vec<Arc<RegisteredPolicy>> {
        let ids = self.index.candidates(request);
        let mut candidates: Vec<Arc<RegisteredPolicy>> = if ids.is_empty() {
            self.policies.values().cloned().collect()
        } else {
            ids.iter()
                .filter_map(|id| self.policies.get(id))
                .cloned()
                .collect()
        };

        candidates.retain(|entry| {
            entry.policy.enabled
                && entry
                    .policy
                    .target_conditions
                    .iter()
                    .all(|cond| evaluate_condition(cond, request, &entry.patterns))
        });
        candidates.sort_by(|a, b| {
            b.policy
                .priority
                .cmp(&a.policy.priority)
                .then(a.seq.cmp(&b.seq))
        });
        candidates
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Registry, index and evaluation counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyStats {
    pub total_policies: usize,
    pub enabled_policies: usize,
    pub total_rules: usize,
    /// Distinct attribute names in the index.
    pub indexed_attributes: usize,
    /// `(attribute, policy)` pairs in the index.
    pub index_entries: usize,
    /// Calls to `evaluate_access`, cached or not.
    pub total_evaluations: u64,
    pub cache_hits: u64,
    /// Individual policies evaluated across all uncached requests.
    pub policy_evaluations: u64,
    pub allow_decisions: u64,
    pub deny_decisions: u64,
    pub not_applicable_decisions: u64,
    pub indeterminate_decisions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    evaluations: AtomicU64,
    cache_hits: AtomicU64,
    policy_evaluations: AtomicU64,
    allow: AtomicU64,
    deny: AtomicU64,
    not_applicable: AtomicU64,
    indeterminate: AtomicU64,
}

impl Counters {
    fn record(&self, decision: Decision) {
        let counter = match decision {
            Decision::Allow => &self.allow,
            Decision::Deny => &self.deny,
            Decision::NotApplicable => &self.not_applicable,
            Decision::Indeterminate => &self.indeterminate,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Attribute-based policy decision point.
///
/// `AbacEngine` is `Send + Sync`; share it behind an `Arc` to evaluate
/// from many threads.
pub struct AbacEngine {
    config: AbacConfig,
    snapshot: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
    cache: DecisionCache,
    counters: Counters,
}

impl AbacEngine {
    /// Creates an engine with no policies.
    ///
    /// # Errors
    ///
    /// Returns [`AbacError::Validation`] if the configuration is invalid.
    pub fn new(config: AbacConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_validated(config))
    }

    fn with_validated(config: AbacConfig) -> Self {
        let cache = DecisionCache::new(
            config.cache_capacity,
            config.cache_ttl(),
            config.sweep_interval(),
        );
        Self {
            config,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            writer: Mutex::new(()),
            cache,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &AbacConfig {
        &self.config
    }

    fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().ok().map(|guard| Arc::clone(&guard))
    }

    /// Applies `change` to a copy of the current snapshot and publishes it.
    fn update<T>(&self, change: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| AbacError::Poisoned("registry"))?;
        let current = self
            .current()
            .ok_or_else(|| AbacError::Poisoned("snapshot"))?;

        let mut next = Snapshot::clone(&current);
        let out = change(&mut next)?;

        let mut slot = self
            .snapshot
            .write()
            .map_err(|_| AbacError::Poisoned("snapshot"))?;
        *slot = Arc::new(next);
        drop(slot);

        // still under the writer lock, so generations follow snapshot order
        self.cache.invalidate();
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------------

    /// Validates, compiles and indexes a policy.
    ///
    /// Clears the decision cache.
    ///
    /// # Errors
    ///
    /// - [`AbacError::Validation`] for structural problems
    /// - [`AbacError::InvalidPattern`] for an unsafe or malformed regex
    /// - [`AbacError::DuplicatePolicy`] if the id is already registered
    pub fn register_policy(&self, policy: AbacPolicy) -> Result<()> {
        policy.validate()?;
        let mut patterns = PatternSet::new();
        patterns.compile_all(policy.all_conditions(), &self.config)?;

        let policy_id = policy.policy_id.clone();
        let rules = policy.rules.len();
        self.update(move |snapshot| {
            if snapshot.policies.contains_key(&policy.policy_id) {
                return Err(AbacError::DuplicatePolicy(policy.policy_id.clone()));
            }
            snapshot.index.insert(&policy);
            let seq = snapshot.next_seq;
            snapshot.next_seq += 1;
            snapshot.policies.insert(
                policy.policy_id.clone(),
                Arc::new(RegisteredPolicy {
                    policy,
                    patterns,
                    seq,
                }),
            );
            Ok(())
        })?;

        info!(policy_id = %policy_id, rules, "Policy registered");
        Ok(())
    }

    /// Removes a policy and its index entries, returning it.
    ///
    /// Clears the decision cache.
    ///
    /// # Errors
    ///
    /// Returns [`AbacError::PolicyNotFound`] for an unknown id.
    pub fn unregister_policy(&self, policy_id: &str) -> Result<AbacPolicy> {
        let removed = self.update(|snapshot| {
            let entry = snapshot
                .policies
                .remove(policy_id)
                .ok_or_else(|| AbacError::PolicyNotFound(policy_id.to_string()))?;
            snapshot.index.remove(&entry.policy);
            Ok(entry)
        })?;

        info!(policy_id = %policy_id, "Policy unregistered");
        Ok(removed.policy.clone())
    }

    /// Returns a copy of a registered policy.
    pub fn policy(&self, policy_id: &str) -> Option<AbacPolicy> {
        self.current()?
            .policies
            .get(policy_id)
            .map(|entry| entry.policy.clone())
    }

    /// Registered policy ids in registration order.
    pub fn policy_ids(&self) -> Vec<String> {
        let Some(snapshot) = self.current() else {
            return Vec::new();
        };
        let mut entries: Vec<&Arc<RegisteredPolicy>> = snapshot.policies.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
            .into_iter()
            .map(|entry| entry.policy.policy_id.clone())
            .collect()
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    /// Decides a request against every applicable policy.
    ///
    /// Never panics and never fails: a missing attribute or malformed value
    /// simply makes its condition false, and an engine that cannot take a
    /// consistent snapshot answers [`Decision::Indeterminate`].
    pub fn evaluate_access(&self, request: &AccessRequest) -> PolicyDecision {
        self.counters.evaluations.fetch_add(1, Ordering::Relaxed);

        let key = self.config.cache_enabled.then(|| request.cache_key());
        if let Some(key) = &key {
            self.cache.maybe_sweep();
            if let Some(hit) = self.cache.get(key) {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                self.counters.record(hit.decision);
                debug!(
                    request_id = %request.request_id,
                    decision = hit.decision.as_str(),
                    "Decision served from cache"
                );
                return hit;
            }
        }

        let started = Instant::now();
        let generation = self.cache.generation();
        let Some(snapshot) = self.current() else {
            warn!(
                request_id = %request.request_id,
                "Policy snapshot unavailable, decision indeterminate"
            );
            self.counters.record(Decision::Indeterminate);
            return PolicyDecision::new(Decision::Indeterminate);
        };

        let mut decision = self.combine(&snapshot, request);
        decision.evaluation_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.counters.record(decision.decision);

        debug!(
            request_id = %request.request_id,
            decision = decision.decision.as_str(),
            policies = decision.evaluated_policies.len(),
            elapsed_ms = decision.evaluation_time_ms,
            "Access evaluated"
        );

        if let Some(key) = key {
            self.cache.insert(key, decision.clone(), generation);
        }
        decision
    }

    /// Cross-policy combining over the applicable candidates.
    fn combine(&self, snapshot: &Snapshot, request: &AccessRequest) -> PolicyDecision {
        let mut out = PolicyDecision::new(Decision::NotApplicable);

        for entry in snapshot.applicable(request) {
            self.counters
                .policy_evaluations
                .fetch_add(1, Ordering::Relaxed);
            let result = evaluate_policy(&entry.policy, request, &entry.patterns);
            out.evaluated_policies.push(entry.policy.policy_id.clone());

            match result.decision {
                Decision::Allow => {
                    out.matched_rules.extend(result.matched_rules);
                    out.obligations.extend(result.obligations);
                    out.advice.extend(result.advice);
                    if entry.policy.combining_algorithm == CombiningAlgorithm::FirstApplicable {
                        break;
                    }
                }
                Decision::Deny => {
                    out.denied_rules.extend(result.denied_rules);
                    if entry.policy.combining_algorithm == CombiningAlgorithm::DenyOverrides {
                        return finish(out, Decision::Deny);
                    }
                }
                Decision::NotApplicable | Decision::Indeterminate => {}
            }
        }

        let outcome = if !out.matched_rules.is_empty() {
            Decision::Allow
        } else if !out.denied_rules.is_empty() {
            Decision::Deny
        } else {
            Decision::NotApplicable
        };
        finish(out, outcome)
    }

    // ------------------------------------------------------------------------
    // Cache and statistics
    // ------------------------------------------------------------------------

    /// Drops every cached decision.
    pub fn clear_cache(&self) {
        self.cache.invalidate();
        debug!("Decision cache cleared");
    }

    /// Removes expired cache entries now, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        self.cache.stats(self.config.cache_enabled)
    }

    pub fn get_policy_stats(&self) -> PolicyStats {
        let snapshot = self.current().unwrap_or_default();
        let c = &self.counters;
        PolicyStats {
            total_policies: snapshot.policies.len(),
            enabled_policies: snapshot
                .policies
                .values()
                .filter(|e| e.policy.enabled)
                .count(),
            total_rules: snapshot.policies.values().map(|e| e.policy.rules.len()).sum(),
            indexed_attributes: snapshot.index.attribute_count(),
            index_entries: snapshot.index.entry_count(),
            total_evaluations: c.evaluations.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            policy_evaluations: c.policy_evaluations.load(Ordering::Relaxed),
            allow_decisions: c.allow.load(Ordering::Relaxed),
            deny_decisions: c.deny.load(Ordering::Relaxed),
            not_applicable_decisions: c.not_applicable.load(Ordering::Relaxed),
            indeterminate_decisions: c.indeterminate.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &DecisionCache {
        &self.cache
    }
}

impl Default for AbacEngine {
    fn default() -> Self {
        Self::with_validated(AbacConfig::default())
    }
}

fn finish(mut decision: PolicyDecision, outcome: Decision) -> PolicyDecision {
    decision.decision = outcome;
    decision.confidence_score = outcome.confidence();
    decision
}
