//! Check command - validate policy documents.

use std::path::Path;

use anyhow::{Context, Result};
use tessera_abac::{AbacEngine, loader};
use tessera_config::TesseraConfig;

use crate::style::{print_error, print_info_table, print_success};

/// Loads and registers every policy at `path`, failing on the first invalid one.
pub fn run(config: &TesseraConfig, path: &Path) -> Result<()> {
    let policies = match loader::load_policies(path) {
        Ok(policies) => policies,
        Err(e) => {
            print_error(&format!("{}: {e}", path.display()));
            return Err(e).context("Policy check failed");
        }
    };

    let engine = AbacEngine::new(config.engine.clone()).context("Invalid engine configuration")?;
    for policy in policies {
        let id = policy.policy_id.clone();
        if let Err(e) = engine.register_policy(policy) {
            print_error(&format!("policy '{id}': {e}"));
            return Err(e).context("Policy check failed");
        }
    }

    let stats = engine.get_policy_stats();
    print_success(&format!(
        "{} {} valid",
        stats.total_policies,
        if stats.total_policies == 1 {
            "policy"
        } else {
            "policies"
        }
    ));

    let total = stats.total_policies.to_string();
    let enabled = stats.enabled_policies.to_string();
    let rules = stats.total_rules.to_string();
    let attributes = stats.indexed_attributes.to_string();
    print_info_table(&[
        ("Policies", total.as_str()),
        ("Enabled", enabled.as_str()),
        ("Rules", rules.as_str()),
        ("Indexed attributes", attributes.as_str()),
    ]);
    Ok(())
}
