//! Layered configuration: built-in defaults, then an optional YAML file, then environment
//! variables. Overlays are applied once, at construction.

pub mod value;

pub use value::{ConfigValue, FromConfigValue, IntoConfigValue};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::model::{GenerationOverrides, LoadOptions, ModelId, ModelKind};
use crate::core::{Error, Result};
use crate::envconfig::{self, expand_home};

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_CACHE_DIR: &str = "~/.cache/mlx_models";

pub type Section = BTreeMap<String, ConfigValue>;

pub fn default_values() -> BTreeMap<String, ConfigValue> {
    fn section(entries: &[(&str, ConfigValue)]) -> ConfigValue {
        ConfigValue::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    let mut values = BTreeMap::new();
    values.insert(
        "models".to_string(),
        section(&[
            ("default_llm", "Phi-3.5-mini-instruct-4bit".into_config_value()),
            ("default_vlm", "SmolVLM-Instruct-bf16".into_config_value()),
            ("default_alm", "whisper-large-v3-mlx".into_config_value()),
        ]),
    );
    values.insert(
        "generation".to_string(),
        section(&[
            ("max_tokens", ConfigValue::Int(500)),
            ("temperature", ConfigValue::Float(0.8)),
            ("top_p", ConfigValue::Float(0.95)),
            ("repetition_penalty", ConfigValue::Float(1.0)),
        ]),
    );
    values.insert(
        "system".to_string(),
        section(&[
            ("cache_dir", DEFAULT_CACHE_DIR.into_config_value()),
            ("logging_level", "INFO".into_config_value()),
            ("trust_remote_code", ConfigValue::Bool(true)),
        ]),
    );
    // Advisory only: nothing in this crate enforces concurrency or timeouts.
    values.insert(
        "batch".to_string(),
        section(&[
            ("max_concurrent", ConfigValue::Int(4)),
            ("timeout", ConfigValue::Int(300)),
        ]),
    );
    values
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    path: PathBuf,
    values: BTreeMap<String, ConfigValue>,
}

impl Config {
    /// Loads defaults, then `path` (or `config.yaml`), then the process environment.
    pub fn new(path: Option<&Path>) -> Self {
        Self::from_sources(path, envconfig::process_env)
    }

    /// Same as [`Config::new`] with an explicit environment lookup.
    pub fn from_sources<F>(path: Option<&Path>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            path: path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
            values: default_values(),
        };
        config.load_file();
        config.apply_env(env);
        config
    }

    /// Defaults only, no overlays.
    pub fn defaults() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CONFIG_FILE),
            values: default_values(),
        }
    }

    /// Only the contents of the file at `path`, without defaults or environment overrides.
    /// A missing file yields an empty configuration; an unreadable or malformed one is an error.
    pub fn from_file(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            match read_yaml(path)? {
                None | Some(ConfigValue::Null) => BTreeMap::new(),
                Some(ConfigValue::Map(values)) => values,
                Some(_) => {
                    return Err(Error::Config(format!(
                        "{}: top level is not a mapping",
                        path.display()
                    )))
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_file(&mut self) {
        if !self.path.exists() {
            tracing::info!("Config file {} not found, using defaults", self.path.display());
            return;
        }

        match read_yaml(&self.path) {
            Ok(None) | Ok(Some(ConfigValue::Null)) => {}
            Ok(Some(ConfigValue::Map(overlay))) => {
                merge_into(&mut self.values, overlay);
                tracing::info!("Loaded config from {}", self.path.display());
            }
            Ok(Some(_)) => {
                tracing::error!(
                    "Failed to load config file {}: top level is not a mapping",
                    self.path.display()
                );
                tracing::info!("Using default configuration");
            }
            Err(e) => {
                tracing::error!("Failed to load config file {}: {}", self.path.display(), e);
                tracing::info!("Using default configuration");
            }
        }
    }

    fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (var, section, key, raw) in envconfig::collect_overrides(env) {
            match envconfig::coerce(key, &raw) {
                Ok(value) => {
                    tracing::debug!("Set {}.{} = {} from environment", section, key, value);
                    self.set(section, key, value);
                }
                Err(e) => tracing::warn!("Ignoring {}: {}", var, e),
            }
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&ConfigValue> {
        self.values
            .get(section)
            .and_then(ConfigValue::as_map)
            .and_then(|s| s.get(key))
    }

    pub fn get_or(&self, section: &str, key: &str, default: ConfigValue) -> ConfigValue {
        self.get(section, key).cloned().unwrap_or(default)
    }

    pub fn get_as<T: FromConfigValue>(&self, section: &str, key: &str) -> Option<T> {
        self.get(section, key).and_then(T::from_config_value)
    }

    /// An owned copy of `section`; empty if the section is missing.
    pub fn get_section(&self, section: &str) -> Section {
        self.values
            .get(section)
            .and_then(ConfigValue::as_map)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set<V: IntoConfigValue>(&mut self, section: &str, key: &str, value: V) {
        let entry = self
            .values
            .entry(section.to_string())
            .or_insert_with(|| ConfigValue::Map(BTreeMap::new()));
        if !matches!(entry, ConfigValue::Map(_)) {
            *entry = ConfigValue::Map(BTreeMap::new());
        }
        if let ConfigValue::Map(map) = entry {
            map.insert(key.to_string(), value.into_config_value());
        }
    }

    pub fn sections(&self) -> &BTreeMap<String, ConfigValue> {
        &self.values
    }

    /// Every problem with the generation and system settings, in check order.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match self.number("generation", "max_tokens", 0.0) {
            Some(n) if n > 0.0 => {}
            Some(_) => errors.push("max_tokens must be positive".to_string()),
            None => errors.push("max_tokens must be a number".to_string()),
        }

        match self.number("generation", "temperature", 0.8) {
            Some(t) if t > 0.0 && t <= 2.0 => {}
            Some(_) => errors.push("temperature must be between 0 and 2.0".to_string()),
            None => errors.push("temperature must be a number".to_string()),
        }

        match self.number("generation", "top_p", 0.95) {
            Some(p) if p > 0.0 && p <= 1.0 => {}
            Some(_) => errors.push("top_p must be between 0 and 1.0".to_string()),
            None => errors.push("top_p must be a number".to_string()),
        }

        match self.get("system", "cache_dir") {
            None | Some(ConfigValue::Null) => {}
            Some(ConfigValue::String(dir)) if dir.is_empty() => {}
            Some(ConfigValue::String(dir)) => {
                if let Err(e) = fs::create_dir_all(expand_home(dir)) {
                    errors.push(format!("Invalid cache_dir: {}", e));
                }
            }
            Some(other) => errors.push(format!("Invalid cache_dir: {}", other)),
        }

        for key in ["max_concurrent", "timeout"] {
            if let Some(value) = self.get("batch", key) {
                if !matches!(value, ConfigValue::Int(_)) {
                    errors.push(format!("{} must be an integer", key));
                }
            }
        }

        errors
    }

    /// Logs each violation and reports whether the configuration is usable. Never fails.
    pub fn validate(&self) -> bool {
        let errors = self.validation_errors();
        for error in &errors {
            tracing::error!("Configuration validation error: {}", error);
        }
        errors.is_empty()
    }

    fn number(&self, section: &str, key: &str, default: f64) -> Option<f64> {
        match self.get(section, key) {
            None => Some(default),
            Some(value) => value.as_f64(),
        }
    }

    pub fn save_config(&self, path: Option<&Path>) -> Result<()> {
        let output = path.unwrap_or(&self.path);
        write_yaml(output, &self.values)
            .inspect(|_| tracing::info!("Configuration saved to {}", output.display()))
            .inspect_err(|e| {
                tracing::error!("Failed to save config to {}: {}", output.display(), e)
            })
    }

    pub fn create_default_config(path: &Path) -> Result<()> {
        write_yaml(path, &default_values())
            .inspect(|_| tracing::info!("Created default config at {}", path.display()))
            .inspect_err(|e| tracing::error!("Failed to create default config: {}", e))
    }

    pub fn cache_dir(&self) -> PathBuf {
        let dir = self
            .get_as::<String>("system", "cache_dir")
            .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string());
        expand_home(&dir)
    }

    pub fn logging_level(&self) -> String {
        self.get_as::<String>("system", "logging_level")
            .unwrap_or_else(|| "INFO".to_string())
    }

    /// Generation settings from the `generation` section, for use as a facade's stored layer.
    pub fn generation_overrides(&self) -> GenerationOverrides {
        GenerationOverrides {
            max_tokens: self.get_as("generation", "max_tokens"),
            temperature: self.get_as("generation", "temperature"),
            top_p: self.get_as("generation", "top_p"),
            repetition_penalty: self.get_as("generation", "repetition_penalty"),
            ..Default::default()
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        let defaults = LoadOptions::default();
        LoadOptions {
            trust_remote_code: self
                .get_as("system", "trust_remote_code")
                .unwrap_or(defaults.trust_remote_code),
            ..defaults
        }
    }

    /// The configured default model of `kind`, if it names a known identity of that kind.
    pub fn default_model(&self, kind: ModelKind) -> Option<ModelId> {
        let key = match kind {
            ModelKind::Text => "default_llm",
            ModelKind::Vision => "default_vlm",
            ModelKind::Audio => "default_alm",
        };
        self.get_as::<String>("models", key)?
            .parse::<ModelId>()
            .ok()
            .filter(|id| id.kind() == kind)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

fn read_yaml(path: &Path) -> Result<Option<ConfigValue>> {
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_yaml::from_str(&content)?))
}

fn write_yaml(path: &Path, values: &BTreeMap<String, ConfigValue>) -> Result<()> {
    let content = serde_yaml::to_string(values)?;
    fs::write(path, content)?;
    Ok(())
}

/// Recursive merge: mappings present on both sides merge key by key, anything else is replaced.
pub fn merge_into(base: &mut BTreeMap<String, ConfigValue>, overlay: BTreeMap<String, ConfigValue>) {
    for (key, value) in overlay {
        match value {
            ConfigValue::Map(incoming) => match base.get_mut(&key) {
                Some(ConfigValue::Map(existing)) => merge_into(existing, incoming),
                _ => {
                    base.insert(key, ConfigValue::Map(incoming));
                }
            },
            other => {
                base.insert(key, other);
            }
        }
    }
}
