use std::env;
use std::path::PathBuf;

use crate::config::ConfigValue;
use crate::core::{Error, Result};

/// Environment variables recognized by [`crate::config::Config`], each overriding one
/// `(section, key)`.
pub const ENV_MAPPINGS: &[(&str, &str, &str)] = &[
    ("MLX_CACHE_DIR", "system", "cache_dir"),
    ("MLX_LOG_LEVEL", "system", "logging_level"),
    ("MLX_MAX_TOKENS", "generation", "max_tokens"),
    ("MLX_TEMPERATURE", "generation", "temperature"),
    ("MLX_TOP_P", "generation", "top_p"),
    ("MLX_DEFAULT_LLM", "models", "default_llm"),
    ("MLX_DEFAULT_VLM", "models", "default_vlm"),
    ("MLX_DEFAULT_ALM", "models", "default_alm"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Integer,
    Float,
    Bool,
    Text,
}

/// The conversion applied to an environment value is decided by the key it lands on.
pub fn coercion_for(key: &str) -> Coercion {
    match key {
        "max_tokens" | "max_concurrent" | "timeout" => Coercion::Integer,
        "temperature" | "top_p" | "repetition_penalty" => Coercion::Float,
        "trust_remote_code" => Coercion::Bool,
        _ => Coercion::Text,
    }
}

pub fn coerce(key: &str, raw: &str) -> Result<ConfigValue> {
    let trimmed = raw.trim();
    match coercion_for(key) {
        Coercion::Integer => trimmed
            .parse::<i64>()
            .map(ConfigValue::Int)
            .map_err(|e| Error::Config(format!("{} expects an integer, got {:?}: {}", key, raw, e))),
        Coercion::Float => trimmed
            .parse::<f64>()
            .map(ConfigValue::Float)
            .map_err(|e| Error::Config(format!("{} expects a number, got {:?}: {}", key, raw, e))),
        Coercion::Bool => Ok(ConfigValue::Bool(parse_bool(trimmed))),
        Coercion::Text => Ok(ConfigValue::String(raw.to_string())),
    }
}

pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Collects the recognized variables that are set, as `(variable, section, key, raw value)`.
pub fn collect_overrides<F>(lookup: F) -> Vec<(&'static str, &'static str, &'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    ENV_MAPPINGS
        .iter()
        .filter_map(|&(var, section, key)| lookup(var).map(|raw| (var, section, key, raw)))
        .collect()
}

pub fn process_env(var: &str) -> Option<String> {
    env::var(var).ok()
}

/// Replaces a leading `~` with the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    PathBuf::from(path)
}
