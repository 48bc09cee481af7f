use std::path::PathBuf;
use std::sync::Arc;

use super::config::{GenerationOverrides, LoadOptions};
use super::drivers::{AudioDriver, AudioInput, Driver, TextDriver, TextPrompt, VisionDriver, VisionPrompt};
use super::traits::{FragmentStream, InferenceBackend};
use super::{AudioTask, ModelId, ModelInfo, ModelKind};
use crate::core::{Error, Result};

/// One input record for registry-level operations. Each model kind reads the fields it needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub images: Vec<PathBuf>,
    pub audio_file: Option<PathBuf>,
}

impl ModelRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn image(mut self, path: impl Into<PathBuf>) -> Self {
        self.images.push(path.into());
        self
    }

    pub fn audio_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.audio_file = Some(path.into());
        self
    }

    fn text_prompt(&self) -> TextPrompt {
        TextPrompt {
            prompt: self.prompt.clone(),
            system_prompt: self.system_prompt.clone(),
        }
    }

    fn vision_prompt(&self) -> VisionPrompt {
        VisionPrompt {
            prompt: self.prompt.clone(),
            system_prompt: self.system_prompt.clone(),
            images: self.images.clone(),
        }
    }

    fn audio_input(&self, task: AudioTask) -> Result<AudioInput> {
        match task {
            AudioTask::Transcription => self
                .audio_file
                .clone()
                .map(AudioInput::File)
                .ok_or_else(|| Error::invalid_input("audio file path required for transcription")),
            AudioTask::Synthesis => Ok(AudioInput::Text(self.prompt.clone())),
        }
    }
}

/// A loaded facade of any category. Built once from a [`ModelId`] by [`LoadedModel::create`].
pub enum LoadedModel {
    Text(TextDriver),
    Vision(VisionDriver),
    Audio(AudioDriver),
}

impl LoadedModel {
    /// Builds the facade matching the identity's category. The returned facade is not loaded yet.
    pub fn create(
        id: ModelId,
        backend: Arc<dyn InferenceBackend>,
        config: Option<GenerationOverrides>,
    ) -> Self {
        match id {
            ModelId::Text(model) => LoadedModel::Text(TextDriver::new(model, backend, config)),
            ModelId::Vision(model) => LoadedModel::Vision(VisionDriver::new(model, backend, config)),
            ModelId::Audio(model) => LoadedModel::Audio(AudioDriver::new(model, backend, config)),
        }
    }

    pub fn id(&self) -> ModelId {
        match self {
            LoadedModel::Text(d) => d.id(),
            LoadedModel::Vision(d) => d.id(),
            LoadedModel::Audio(d) => d.id(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.id().name()
    }

    pub fn kind(&self) -> ModelKind {
        self.id().kind()
    }

    pub fn load(&mut self, options: &LoadOptions) -> Result<()> {
        match self {
            LoadedModel::Text(d) => d.load(options),
            LoadedModel::Vision(d) => d.load(options),
            LoadedModel::Audio(d) => d.load(options),
        }
    }

    pub fn is_loaded(&self) -> bool {
        match self {
            LoadedModel::Text(d) => d.is_loaded(),
            LoadedModel::Vision(d) => d.is_loaded(),
            LoadedModel::Audio(d) => d.is_loaded(),
        }
    }

    pub fn info(&self) -> ModelInfo {
        match self {
            LoadedModel::Text(d) => d.info(),
            LoadedModel::Vision(d) => d.info(),
            LoadedModel::Audio(d) => d.info(),
        }
    }

    /// Dispatches `request` to the category-specific `generate`.
    pub fn generate(&mut self, request: &ModelRequest, overrides: &GenerationOverrides) -> Result<String> {
        match self {
            LoadedModel::Text(d) => d.generate(&request.text_prompt(), overrides),
            LoadedModel::Vision(d) => d.generate(&request.vision_prompt(), overrides),
            LoadedModel::Audio(d) => {
                if !d.is_loaded() {
                    return Err(Error::NotLoaded(d.model().name().to_string()));
                }
                let input = request.audio_input(d.task())?;
                d.generate(&input, overrides)
            }
        }
    }

    pub fn stream<'a>(
        &'a mut self,
        request: &ModelRequest,
        overrides: &GenerationOverrides,
    ) -> Result<FragmentStream<'a>> {
        match self {
            LoadedModel::Text(d) => d.stream(&request.text_prompt(), overrides),
            LoadedModel::Vision(d) => d.stream(&request.vision_prompt(), overrides),
            LoadedModel::Audio(d) => {
                if !d.is_loaded() {
                    return Err(Error::NotLoaded(d.model().name().to_string()));
                }
                let input = request.audio_input(d.task())?;
                d.stream(&input, overrides)
            }
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextDriver> {
        match self {
            LoadedModel::Text(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_vision_mut(&mut self) -> Option<&mut VisionDriver> {
        match self {
            LoadedModel::Vision(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_audio_mut(&mut self) -> Option<&mut AudioDriver> {
        match self {
            LoadedModel::Audio(d) => Some(d),
            _ => None,
        }
    }
}
