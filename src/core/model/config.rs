use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MAX_TOKENS: usize = 500;
pub const DEFAULT_TEMPERATURE: f32 = 0.8;
pub const DEFAULT_TOP_P: f32 = 0.95;
pub const DEFAULT_REPETITION_PENALTY: f32 = 1.0;

/// Fully resolved sampling parameters handed to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    pub verbose: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            repetition_penalty: DEFAULT_REPETITION_PENALTY,
            verbose: false,
        }
    }
}

impl GenerationParams {
    /// Layers `stored` and then `call` on top of the defaults; later layers win.
    pub fn resolve(stored: &GenerationOverrides, call: &GenerationOverrides) -> Self {
        let mut params = Self::default();
        params.apply(stored);
        params.apply(call);
        params
    }

    pub fn apply(&mut self, overrides: &GenerationOverrides) {
        if let Some(v) = overrides.max_tokens {
            self.max_tokens = v;
        }
        if let Some(v) = overrides.temperature {
            self.temperature = v;
        }
        if let Some(v) = overrides.top_p {
            self.top_p = v;
        }
        if let Some(v) = overrides.repetition_penalty {
            self.repetition_penalty = v;
        }
        if let Some(v) = overrides.verbose {
            self.verbose = v;
        }
    }
}

/// A partial set of generation options. Unset fields defer to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_timestamps: Option<bool>,
}

impl GenerationOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = Some(n);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.top_p = Some(p);
        self
    }

    pub fn repetition_penalty(mut self, penalty: f32) -> Self {
        self.repetition_penalty = Some(penalty);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn word_timestamps(mut self, enabled: bool) -> Self {
        self.word_timestamps = Some(enabled);
        self
    }

    /// Returns a copy of `self` with every field set in `other` taking precedence.
    pub fn merged(&self, other: &GenerationOverrides) -> Self {
        Self {
            max_tokens: other.max_tokens.or(self.max_tokens),
            temperature: other.temperature.or(self.temperature),
            top_p: other.top_p.or(self.top_p),
            repetition_penalty: other.repetition_penalty.or(self.repetition_penalty),
            verbose: other.verbose.or(self.verbose),
            language: other.language.clone().or_else(|| self.language.clone()),
            word_timestamps: other.word_timestamps.or(self.word_timestamps),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    pub adapter_path: Option<PathBuf>,
    pub lazy: bool,
    pub trust_remote_code: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            adapter_path: None,
            lazy: false,
            trust_remote_code: true,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adapter_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.adapter_path = Some(path.into());
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn trust_remote_code(mut self, trust: bool) -> Self {
        self.trust_remote_code = trust;
        self
    }
}

/// Options for the speech recognition call.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeOptions {
    pub language: Option<String>,
    pub temperature: f32,
    pub word_timestamps: bool,
    pub verbose: bool,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            language: None,
            temperature: 0.0,
            word_timestamps: false,
            verbose: true,
        }
    }
}

impl TranscribeOptions {
    /// Built from call-time overrides only. Settings stored on the facade are sampling
    /// settings for generation and do not apply to recognition.
    pub fn resolve(call: &GenerationOverrides) -> Self {
        let defaults = Self::default();
        Self {
            language: call.language.clone(),
            temperature: call.temperature.unwrap_or(defaults.temperature),
            word_timestamps: call.word_timestamps.unwrap_or(defaults.word_timestamps),
            verbose: call.verbose.unwrap_or(defaults.verbose),
        }
    }
}
