pub mod catalog;
pub mod config;
pub mod drivers;
pub mod factory;
pub mod registry;
pub mod traits;

pub use catalog::{AudioModel, AudioTask, TextModel, VisionModel};
pub use config::{GenerationOverrides, GenerationParams, LoadOptions, TranscribeOptions};
pub use drivers::{AudioDriver, AudioInput, Driver, TextDriver, TextPrompt, VisionDriver, VisionPrompt};
pub use factory::{LoadedModel, ModelRequest};
pub use registry::ModelRegistry;
pub use traits::{
    AudioHandle, ChatMessage, FragmentStream, InferenceBackend, Role, TextHandle, VisionHandle,
};

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::core::Error;

/// Namespace prepended to every model name to form the repository path handed to the backend.
pub const REPO_NAMESPACE: &str = "mlx-community";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Text,
    Vision,
    Audio,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Text, ModelKind::Vision, ModelKind::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Text => "text",
            ModelKind::Vision => "vision",
            ModelKind::Audio => "audio",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "llm" => Ok(ModelKind::Text),
            "vision" | "vlm" => Ok(ModelKind::Vision),
            "audio" | "alm" => Ok(ModelKind::Audio),
            _ => Err(Error::invalid_input(format!("unknown model kind: {}", s))),
        }
    }
}

/// A model identity drawn from one of the three catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelId {
    Text(TextModel),
    Vision(VisionModel),
    Audio(AudioModel),
}

impl ModelId {
    pub fn name(&self) -> &'static str {
        match self {
            ModelId::Text(m) => m.name(),
            ModelId::Vision(m) => m.name(),
            ModelId::Audio(m) => m.name(),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ModelId::Text(_) => ModelKind::Text,
            ModelId::Vision(_) => ModelKind::Vision,
            ModelId::Audio(_) => ModelKind::Audio,
        }
    }

    pub fn repo_path(&self) -> String {
        repo_path(self.name())
    }

    pub fn all() -> impl Iterator<Item = ModelId> {
        TextModel::ALL
            .iter()
            .copied()
            .map(ModelId::Text)
            .chain(VisionModel::ALL.iter().copied().map(ModelId::Vision))
            .chain(AudioModel::ALL.iter().copied().map(ModelId::Audio))
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        ModelId::all()
            .find(|id| id.name() == name)
            .ok_or_else(|| Error::UnrecognizedIdentity(s.to_string()))
    }
}

impl From<TextModel> for ModelId {
    fn from(model: TextModel) -> Self {
        ModelId::Text(model)
    }
}

impl From<VisionModel> for ModelId {
    fn from(model: VisionModel) -> Self {
        ModelId::Vision(model)
    }
}

impl From<AudioModel> for ModelId {
    fn from(model: AudioModel) -> Self {
        ModelId::Audio(model)
    }
}

pub fn repo_path(name: &str) -> String {
    format!("{}/{}", REPO_NAMESPACE, name)
}

/// Snapshot of a facade's state, as reported by `Driver::info`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub kind: ModelKind,
    pub repo_path: String,
    pub loaded: bool,
    pub config: GenerationOverrides,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_path() {
        let id = ModelId::from(TextModel::Phi35MiniInstruct4bit);
        assert_eq!(id.repo_path(), "mlx-community/Phi-3.5-mini-instruct-4bit");
        assert_eq!(
            ModelId::from(AudioModel::WhisperLargeV3Mlx).repo_path(),
            "mlx-community/whisper-large-v3-mlx"
        );
    }

    #[test]
    fn test_parse_classifies_by_catalog() {
        let id: ModelId = "Molmo-7B-D-0924-bf16".parse().unwrap();
        assert_eq!(id, ModelId::Vision(VisionModel::Molmo7bD0924Bf16));
        assert_eq!(id.kind(), ModelKind::Vision);

        let id: ModelId = "Kokoro-82M-bf16".parse().unwrap();
        assert_eq!(id.kind(), ModelKind::Audio);

        assert!(matches!(
            "gpt-2".parse::<ModelId>(),
            Err(Error::UnrecognizedIdentity(name)) if name == "gpt-2"
        ));
    }

    #[test]
    fn test_all_covers_every_catalog() {
        assert_eq!(ModelId::all().count(), 22);
        assert_eq!(ModelId::all().filter(|id| id.kind() == ModelKind::Vision).count(), 5);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("VLM".parse::<ModelKind>().unwrap(), ModelKind::Vision);
        assert!("video".parse::<ModelKind>().is_err());
    }
}
