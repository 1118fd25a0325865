//! Attribute-to-policy index for candidate pre-filtering.

use std::collections::{BTreeSet, HashMap};

use crate::attributes::AccessRequest;
use crate::policy::AbacPolicy;

/// Maps each attribute name referenced by a condition to the ids of the
/// policies that reference it.
///
/// Names are stored exactly as they appear in `attribute_name`, so a
/// condition on `"subject.role"` and one on `"role"` occupy separate
/// entries. [`candidates`](Self::candidates) probes both forms.
#[derive(Debug, Clone, Default)]
pub struct PolicyIndex {
    entries: HashMap<String, BTreeSet<String>>,
}

impl PolicyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every target and rule condition of `policy`.
    pub fn insert(&mut self, policy: &AbacPolicy) {
        for condition in policy.all_conditions() {
            self.entries
                .entry(condition.attribute_name.clone())
                .or_default()
                .insert(policy.policy_id.clone());
        }
    }

    /// Removes `policy` from every entry, dropping entries left empty.
    pub fn remove(&mut self, policy: &AbacPolicy) {
        for condition in policy.all_conditions() {
            if let Some(ids) = self.entries.get_mut(&condition.attribute_name) {
                ids.remove(&policy.policy_id);
                if ids.is_empty() {
                    self.entries.remove(&condition.attribute_name);
                }
            }
        }
    }

    /// Union of the policies referencing any attribute present on `request`.
    ///
    /// Each attribute is probed under its qualified (`category.name`) and
    /// bare (`name`) forms. An empty result means no policy references any
    /// request attribute; callers fall back to a full scan.
    pub fn candidates(&self, request: &AccessRequest) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        for (category, attribute) in request.attributes() {
            let qualified = format!("{category}.{}", attribute.name);
            for key in [qualified.as_str(), attribute.name.as_str()] {
                if let Some(ids) = self.entries.get(key) {
                    found.extend(ids.iter().cloned());
                }
            }
        }
        found
    }

    /// Policies indexed under `attribute_name`.
    pub fn policies_for(&self, attribute_name: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(attribute_name)
    }

    /// Number of distinct attribute names indexed.
    pub fn attribute_count(&self) -> usize {
        self.entries.len()
    }

    /// Total `(attribute, policy)` pairs.
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
