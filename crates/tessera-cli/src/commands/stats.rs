//! Stats command - registry and index statistics.

use std::path::Path;

use anyhow::Result;
use tessera_config::TesseraConfig;

use super::load_engine;
use crate::style::{SemanticStyle, print_info_table};

pub fn run(config: &TesseraConfig, policies: Option<&Path>, json: bool) -> Result<()> {
    let engine = load_engine(config, policies)?;
    let stats = engine.get_policy_stats();
    let cache = engine.get_cache_stats();

    if json {
        let out = serde_json::json!({ "policies": stats, "cache": cache });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", "Policy statistics".header());
    let rows = [
        ("Policies", stats.total_policies.to_string()),
        ("Enabled", stats.enabled_policies.to_string()),
        ("Rules", stats.total_rules.to_string()),
        ("Indexed attributes", stats.indexed_attributes.to_string()),
        ("Index entries", stats.index_entries.to_string()),
        ("Decision cache", describe_cache(cache.enabled, cache.capacity, cache.ttl_secs)),
    ];
    let entries: Vec<(&str, &str)> = rows.iter().map(|(k, v)| (*k, v.as_str())).collect();
    print_info_table(&entries);
    Ok(())
}

fn describe_cache(enabled: bool, capacity: usize, ttl_secs: u64) -> String {
    if enabled {
        format!("{capacity} entries, {ttl_secs}s TTL")
    } else {
        "disabled".to_string()
    }
}
