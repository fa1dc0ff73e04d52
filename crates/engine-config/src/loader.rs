//! Config loading: JSON documents carrying `${ENV}` and `{dotted.path}` /
//! `{auto}` placeholders, resolved via [`crate::substitution`].

use std::path::Path;

use engine_common::Result;
use serde_json::Value;

use crate::model::{AppConfig, ServerConfig};
use crate::substitution::{replace_config_args, replace_env_vars};

/// Parses a server config JSON document, resolving `${ENV}` references.
pub fn parse_server_config_json(raw: &str) -> Result<ServerConfig> {
    let mut value: Value = serde_json::from_str(raw)?;
    replace_env_vars(&mut value)?;
    let cfg: ServerConfig = serde_json::from_value(value)?;
    Ok(cfg)
}

/// Loads and parses a server config JSON file from disk.
pub fn load_server_config(path: impl AsRef<Path>) -> Result<ServerConfig> {
    let raw = std::fs::read_to_string(path)?;
    parse_server_config_json(&raw)
}

/// Parses an application config JSON document, resolving both `${ENV}`
/// references and `{dotted.path}` / `{auto}` internal references.
pub fn parse_app_config_json(raw: &str) -> Result<AppConfig> {
    let mut value: Value = serde_json::from_str(raw)?;
    replace_env_vars(&mut value)?;
    replace_config_args(&mut value);
    let cfg: AppConfig = serde_json::from_value(value)?;
    Ok(cfg)
}

/// Loads and parses an application config JSON file from disk.
pub fn load_app_config(path: impl AsRef<Path>) -> Result<AppConfig> {
    let raw = std::fs::read_to_string(path)?;
    parse_app_config_json(&raw)
}

/// Loads a `.env` file (if present) into the process environment, for local
/// development. No-op, non-fatal if the file is absent.
pub fn load_dotenv(path: impl AsRef<Path>) {
    let _ = dotenvy::from_path(path);
}
