//! Two-pass textual config substitution.
//!
//! `replace_env_vars` resolves `${ENV_VAR}` references (case-insensitively,
//! against the process environment) and fails if any remain unresolved.
//! `replace_config_args` walks the config tree twice, replacing `{auto}`
//! with the value's own dotted path and `{dotted.path}` with the value found
//! by navigating the tree at that path. Two passes let a substitution
//! introduced by one field resolve a reference in another.

use regex::Regex;
use serde_json::Value;

use engine_common::{EngineError, Result};

/// Resolves every `${ENV_VAR}` occurrence in string values of `root` against
/// the process environment (variable name upper-cased). Fails if any
/// reference remains unresolved.
pub fn replace_env_vars(root: &mut Value) -> Result<()> {
    let re = Regex::new(r"\$\{([^}{]+)\}").expect("static regex");
    replace_env_in_value(root, &re);
    if contains_env_placeholder(root, &re) {
        return Err(EngineError::Config(
            "unresolved ${...} environment variable reference remains after substitution"
                .to_string(),
        ));
    }
    Ok(())
}

fn replace_env_in_value(node: &mut Value, re: &Regex) {
    match node {
        Value::Object(map) => {
            for v in map.values_mut() {
                replace_env_in_value(v, re);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                replace_env_in_value(v, re);
            }
        }
        Value::String(s) => {
            let replaced = re.replace_all(s, |caps: &regex::Captures| {
                let var = caps[1].to_uppercase();
                std::env::var(&var).unwrap_or_else(|_| caps[0].to_string())
            });
            *s = replaced.into_owned();
        }
        _ => {}
    }
}

fn contains_env_placeholder(node: &Value, re: &Regex) -> bool {
    match node {
        Value::Object(map) => map.values().any(|v| contains_env_placeholder(v, re)),
        Value::Array(arr) => arr.iter().any(|v| contains_env_placeholder(v, re)),
        Value::String(s) => re.is_match(s),
        _ => false,
    }
}

/// Runs the `{auto}` / `{dotted.path}` substitution pass twice over `root`.
pub fn replace_config_args(root: &mut Value) {
    for _ in 0..2 {
        let snapshot = root.clone();
        replace_in_value(root, &snapshot, &mut Vec::new());
    }
}

fn replace_in_value(node: &mut Value, root: &Value, path: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                path.push(k.clone());
                replace_in_value(v, root, path);
                path.pop();
            }
        }
        Value::Array(arr) => {
            for (i, v) in arr.iter_mut().enumerate() {
                path.push(i.to_string());
                replace_in_value(v, root, path);
                path.pop();
            }
        }
        Value::String(s) => {
            if s == "{auto}" {
                *s = path.join(".");
            } else if let Some(dotted) = placeholder_path(s) {
                if let Some(resolved) = lookup_path(root, &dotted) {
                    *node = resolved;
                }
            }
        }
        _ => {}
    }
}

fn placeholder_path(s: &str) -> Option<&str> {
    if s.starts_with('{') && s.ends_with('}') && s.len() > 2 && s != "{auto}" {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

fn lookup_path(root: &Value, dotted: &str) -> Option<Value> {
    let mut cur = root;
    for part in dotted.split('.') {
        cur = cur.get(part)?;
    }
    Some(cur.clone())
}
