//! # tessera-abac: Attribute-Based Access Control decision point
//!
//! Decides whether an access request is allowed by evaluating registered
//! policies against the request's subject, resource, action, environment
//! and context attributes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  AccessRequest                               │
//! │  (subject/resource/action/env/context)       │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Decision Cache (TTL, LRU)                   │──── hit ───┐
//! └─────────────────┬───────────────────────────┘            │
//!                   │ miss                                   │
//!                   ▼                                        │
//! ┌─────────────────────────────────────────────┐            │
//! │  Policy Index                                │            │
//! │  ├─ attribute name → policy ids              │            │
//! │  ├─ full scan when nothing matches           │            │
//! │  └─ enabled + target conditions filter       │            │
//! └─────────────────┬───────────────────────────┘            │
//!                   │ candidates (priority desc)             │
//!                   ▼                                        │
//! ┌─────────────────────────────────────────────┐            │
//! │  Policy Evaluator                            │            │
//! │  ├─ deny rules first, then allow rules       │            │
//! │  ├─ rules: AND / OR / NOT (NAND)             │            │
//! │  └─ conditions: typed operators              │            │
//! └─────────────────┬───────────────────────────┘            │
//!                   │ per-policy decisions                   │
//!                   ▼                                        │
//! ┌─────────────────────────────────────────────┐            │
//! │  Cross-policy combining                      │            │
//! │  first-applicable / deny- / permit-overrides │            │
//! └─────────────────┬───────────────────────────┘            │
//!                   ▼                                        │
//! ┌─────────────────────────────────────────────┐            │
//! │  PolicyDecision                              │◄───────────┘
//! │  allow / deny / not_applicable / indet.      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Request-time problems never raise: a missing attribute, a failed numeric
//! coercion or an unknown operator makes the condition false. Malformed
//! policies are rejected when they are registered.
//!
//! ## Examples
//!
//! ```
//! use tessera_abac::{
//!     AbacEngine, AbacPolicy, AbacRule, AccessRequest, AttributeCondition, Decision, Effect,
//!     Operator,
//! };
//!
//! let engine = AbacEngine::default();
//! let rule = AbacRule::new(
//!     "admins",
//!     Effect::Allow,
//!     vec![AttributeCondition::new("subject.role", Operator::Eq, "admin")],
//! )?;
//! engine.register_policy(AbacPolicy::new("admin-access", "Admin access").with_rule(rule))?;
//!
//! let request = AccessRequest::new("req-1").subject("role", "admin");
//! let decision = engine.evaluate_access(&request);
//! assert_eq!(decision.decision, Decision::Allow);
//! # Ok::<(), tessera_abac::AbacError>(())
//! ```

pub mod attributes;
pub mod cache;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod index;
pub mod loader;
pub mod policy;

// Kani proofs for bounded model checking
#[cfg(any(test, kani))]
mod kani_proofs;


pub use attributes::{AccessRequest, AttrValue, Attribute, AttributeCategory, RequestDocument};
pub use cache::CacheStats;
pub use config::AbacConfig;
pub use engine::{AbacEngine, PolicyStats};
pub use error::{AbacError, Result};
pub use evaluator::{Decision, PolicyDecision};
pub use policy::{
    AbacPolicy, AbacRule, AttributeCondition, CombiningAlgorithm, Effect, LogicalOperator,
    Operator,
};
