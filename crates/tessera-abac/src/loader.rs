//! JSON policy and request documents.
//!
//! A policy document is either a single policy object or an array of them.
//! A policy directory is every `*.json` file directly inside it, read in
//! file-name order so registration order is reproducible.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::error::Category;
use tracing::debug;

use crate::attributes::{AccessRequest, RequestDocument};
use crate::engine::AbacEngine;
use crate::error::{AbacError, Result};
use crate::policy::AbacPolicy;

/// Parses a policy document.
///
/// # Errors
///
/// - [`AbacError::Parse`] if the text is not JSON
/// - [`AbacError::Validation`] if the JSON does not describe policies, e.g.
///   an unknown effect or a missing `rules` field
pub fn parse_policies(json: &str) -> Result<Vec<AbacPolicy>> {
    let value: Value = serde_json::from_str(json).map_err(|e| parse_error("policy document", e))?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| decode(item, &format!("policy #{i}")))
            .collect(),
        item => Ok(vec![decode(item, "policy")?]),
    }
}

/// Parses an access request document.
///
/// # Errors
///
/// Same classification as [`parse_policies`].
pub fn parse_request(json: &str) -> Result<AccessRequest> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| parse_error("request document", e))?;
    let doc: RequestDocument = decode(value, "request")?;
    Ok(doc.into())
}

/// Loads policies from a file, or from every `*.json` file in a directory.
///
/// # Errors
///
/// Fails on the first unreadable or malformed file.
pub fn load_policies(path: &Path) -> Result<Vec<AbacPolicy>> {
    if !path.is_dir() {
        return parse_policies(&read(path)?);
    }

    let mut policies = Vec::new();
    for file in policy_files(path)? {
        let loaded = parse_policies(&read(&file)?).map_err(|e| in_file(&file, e))?;
        debug!(file = %file.display(), policies = loaded.len(), "Loaded policy file");
        policies.extend(loaded);
    }
    Ok(policies)
}

/// Reads an access request from a JSON file.
pub fn load_request(path: &Path) -> Result<AccessRequest> {
    parse_request(&read(path)?)
}

/// Loads policies from `path` and registers each with `engine`.
///
/// Stops at the first failure; policies registered before it stay
/// registered. Returns the number registered.
pub fn register_from_path(engine: &AbacEngine, path: &Path) -> Result<usize> {
    let policies = load_policies(path)?;
    let count = policies.len();
    for policy in policies {
        engine.register_policy(policy)?;
    }
    Ok(count)
}

/// `*.json` files directly inside `dir`, sorted by file name.
fn policy_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| AbacError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| AbacError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| AbacError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| parse_error(what, e))
}

/// Shape errors are validation failures; everything else is a parse failure.
fn parse_error(what: &str, e: serde_json::Error) -> AbacError {
    if e.classify() == Category::Data {
        AbacError::validation(format!("invalid {what}: {e}"))
    } else {
        AbacError::Parse {
            what: what.to_string(),
            source: e,
        }
    }
}

fn in_file(file: &Path, e: AbacError) -> AbacError {
    match e {
        AbacError::Validation(msg) => {
            AbacError::Validation(format!("{}: {msg}", file.display()))
        }
        AbacError::Parse { what, source } => AbacError::Parse {
            what: format!("{what} in {}", file.display()),
            source,
        },
        other => other,
    }
}

// ============================================================================
// Tests
// ============================================================================
