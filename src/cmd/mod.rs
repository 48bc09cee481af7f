use anyhow::{bail, Context, Result};
use serde_json::json;
use std::path::Path;

use mmdriver::config::{Config, ConfigValue, DEFAULT_CONFIG_FILE};
use mmdriver::core::{ModelId, ModelKind};

pub fn models(kind: Option<&str>, as_json: bool) -> Result<()> {
    let kind = kind.map(str::parse::<ModelKind>).transpose()?;
    let ids: Vec<ModelId> = ModelId::all()
        .filter(|id| kind.map_or(true, |k| id.kind() == k))
        .collect();

    if as_json {
        let entries: Vec<_> = ids
            .iter()
            .map(|id| {
                json!({
                    "name": id.name(),
                    "kind": id.kind(),
                    "repo_path": id.repo_path(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{:<40} {:<8} REPOSITORY", "NAME", "KIND");
    for id in ids {
        println!("{:<40} {:<8} {}", id.name(), id.kind(), id.repo_path());
    }
    Ok(())
}

pub fn config_show(path: Option<&Path>, as_json: bool) -> Result<()> {
    let config = Config::new(path);
    if as_json {
        println!("{}", serde_json::to_string_pretty(config.sections())?);
    } else {
        print!("{}", serde_yaml::to_string(config.sections())?);
    }
    Ok(())
}

pub fn config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }
    Config::create_default_config(path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

pub fn config_validate(path: Option<&Path>) -> Result<()> {
    let config = Config::new(path);
    let errors = config.validation_errors();
    if errors.is_empty() {
        println!("Configuration is valid");
        return Ok(());
    }
    for error in &errors {
        println!("  - {}", error);
    }
    bail!("configuration has {} problem(s)", errors.len())
}

pub fn config_get(path: Option<&Path>, section: &str, key: &str) -> Result<()> {
    let config = Config::new(path);
    match config.get(section, key) {
        Some(value) => {
            println!("{}", value);
            Ok(())
        }
        None => bail!("{}.{} is not set", section, key),
    }
}

/// Sets one value in the file. Defaults and `MLX_*` overrides are not written; a file that
/// fails to load is left untouched.
pub fn config_set(path: Option<&Path>, section: &str, key: &str, raw: &str) -> Result<()> {
    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    let mut config = Config::from_file(path)
        .with_context(|| format!("refusing to rewrite {}", path.display()))?;
    let value = parse_scalar(raw);
    println!("{}.{} = {}", section, key, value);
    config.set(section, key, value);
    config.save_config(None)?;
    Ok(())
}

/// Values typed on the command line keep their YAML scalar type; anything else is a string.
fn parse_scalar(raw: &str) -> ConfigValue {
    match serde_yaml::from_str::<ConfigValue>(raw) {
        Ok(value @ (ConfigValue::Bool(_) | ConfigValue::Int(_) | ConfigValue::Float(_))) => value,
        _ => ConfigValue::String(raw.to_string()),
    }
}
