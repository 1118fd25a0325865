//! Eval command - decide one access request.

use std::path::Path;

use anyhow::{Context, Result};
use tessera_abac::loader;
use tessera_config::TesseraConfig;

use super::load_engine;

pub fn run(
    config: &TesseraConfig,
    request: &Path,
    policies: Option<&Path>,
    compact: bool,
) -> Result<()> {
    let engine = load_engine(config, policies)?;
    let request = loader::load_request(request)
        .with_context(|| format!("Failed to read request {}", request.display()))?;

    let decision = engine.evaluate_access(&request);
    let rendered = if compact {
        serde_json::to_string(&decision)?
    } else {
        serde_json::to_string_pretty(&decision)?
    };
    println!("{rendered}");
    Ok(())
}
