//! CLI command implementations.

pub mod check;
pub mod eval;
pub mod stats;
pub mod version;

use std::path::Path;

use anyhow::{Context, Result};
use tessera_abac::AbacEngine;
use tessera_abac::loader;
use tessera_config::TesseraConfig;

/// Builds an engine from the configured limits and registers every policy
/// found at `policies`, or at the configured policy directory.
pub fn load_engine(config: &TesseraConfig, policies: Option<&Path>) -> Result<AbacEngine> {
    let path = policies.unwrap_or(config.policies.directory.as_path());
    let engine = AbacEngine::new(config.engine.clone()).context("Invalid engine configuration")?;
    loader::register_from_path(&engine, path)
        .with_context(|| format!("Failed to load policies from {}", path.display()))?;
    Ok(engine)
}
