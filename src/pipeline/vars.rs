//! Variable preparation for a generation run.
//!
//! Merges caller-supplied variables with generator-computed ones, applies
//! template-declared defaults, enforces required variables, and type-checks
//! declared values. A missing required variable is structural: the whole
//! generation fails before any filesystem mutation.
//!
//! Precedence, lowest to highest: generated values, declared defaults,
//! caller-supplied values.

use crate::error::{LatheError, Result};
use crate::paths::ResolvedPath;
use crate::template::VariableSpec;
use std::collections::HashMap;

/// Variables lathe computes for every run.
///
/// `generated_by` is `user@host`, matching the actor convention used in the
/// event log.
pub fn generated_variables(
    project_name: &str,
    target: &ResolvedPath,
) -> HashMap<String, String> {
    let now = chrono::Local::now();
    let mut vars = HashMap::new();
    vars.insert("project_name".to_string(), project_name.to_string());
    vars.insert("target_dir".to_string(), target.to_string());
    vars.insert(
        "now_date".to_string(),
        now.format("%Y-%m-%d").to_string(),
    );
    vars.insert("now_datetime".to_string(), now.to_rfc3339());
    vars.insert("generated_by".to_string(), actor());
    vars.insert(
        "lathe_version".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    vars
}

/// `user@host` actor string.
fn actor() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown-host".to_string());
    format!("{}@{}", user, host)
}

/// Merge, default, and validate variables for a run.
///
/// # Errors
///
/// * `StructuralFailure` - a required variable is missing, or a supplied
///   value does not match its declared type tag.
pub fn prepare_variables(
    specs: &[VariableSpec],
    caller: &HashMap<String, String>,
    generated: HashMap<String, String>,
) -> Result<HashMap<String, String>> {
    let mut merged = generated;

    for spec in specs {
        if let Some(default) = spec.default_string() {
            merged.entry(spec.name.clone()).or_insert(default);
        }
    }

    for (key, value) in caller {
        merged.insert(key.clone(), value.clone());
    }

    let mut missing: Vec<&str> = Vec::new();
    for spec in specs {
        match merged.get(&spec.name) {
            None => {
                if spec.required {
                    missing.push(&spec.name);
                }
            }
            Some(value) => {
                if !spec.var_type.accepts(value) {
                    return Err(LatheError::StructuralFailure(format!(
                        "variable '{}' value {:?} does not match its declared type",
                        spec.name, value
                    )));
                }
            }
        }
    }
    if !missing.is_empty() {
        return Err(LatheError::StructuralFailure(format!(
            "missing required variable(s): {}",
            missing.join(", ")
        )));
    }

    Ok(merged)
}
