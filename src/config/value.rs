use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A configuration leaf or nested mapping, as read from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Int(v) => Some(*v as f64),
            ConfigValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn get<T: FromConfigValue>(&self) -> Option<T> {
        T::from_config_value(self)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Null => f.write_str("null"),
            ConfigValue::Bool(v) => write!(f, "{}", v),
            ConfigValue::Int(v) => write!(f, "{}", v),
            ConfigValue::Float(v) => write!(f, "{:?}", v),
            ConfigValue::String(v) => f.write_str(v),
            ConfigValue::Array(_) | ConfigValue::Map(_) => match serde_json::to_string(self) {
                Ok(s) => f.write_str(&s),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

pub trait FromConfigValue: Sized {
    fn from_config_value(value: &ConfigValue) -> Option<Self>;
}

impl FromConfigValue for i64 {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromConfigValue for usize {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Int(v) => usize::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromConfigValue for f64 {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        value.as_f64()
    }
}

impl FromConfigValue for f32 {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        value.as_f64().map(|v| v as f32)
    }
}

impl FromConfigValue for bool {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Bool(v) => Some(*v),
            ConfigValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl FromConfigValue for String {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        value.as_str().map(String::from)
    }
}

impl FromConfigValue for ConfigValue {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        Some(value.clone())
    }
}

pub trait IntoConfigValue {
    fn into_config_value(self) -> ConfigValue;
}

impl IntoConfigValue for i64 {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::Int(self)
    }
}

impl IntoConfigValue for i32 {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::Int(self as i64)
    }
}

impl IntoConfigValue for f64 {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::Float(self)
    }
}

impl IntoConfigValue for bool {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::Bool(self)
    }
}

impl IntoConfigValue for String {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::String(self)
    }
}

impl IntoConfigValue for &str {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::String(self.to_string())
    }
}

impl IntoConfigValue for ConfigValue {
    fn into_config_value(self) -> ConfigValue {
        self
    }
}
