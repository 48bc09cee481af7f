use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use super::{validate_prompt, Driver};
use crate::core::model::catalog::{AudioModel, AudioTask};
use crate::core::model::config::{GenerationOverrides, LoadOptions, TranscribeOptions};
use crate::core::model::traits::{AudioHandle, FragmentStream, InferenceBackend};
use crate::core::model::ModelId;
use crate::core::{Error, Result};

/// Input for an audio model: a recording to transcribe, or text to speak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioInput {
    File(PathBuf),
    Text(String),
}

impl AudioInput {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        AudioInput::File(path.into())
    }

    pub fn text(prompt: impl Into<String>) -> Self {
        AudioInput::Text(prompt.into())
    }
}

pub struct AudioDriver {
    model: AudioModel,
    backend: Arc<dyn InferenceBackend>,
    config: GenerationOverrides,
    handle: Option<Box<dyn AudioHandle>>,
}

impl AudioDriver {
    pub fn new(
        model: AudioModel,
        backend: Arc<dyn InferenceBackend>,
        config: Option<GenerationOverrides>,
    ) -> Self {
        Self {
            model,
            backend,
            config: config.unwrap_or_default(),
            handle: None,
        }
    }

    pub fn model(&self) -> AudioModel {
        self.model
    }

    pub fn task(&self) -> AudioTask {
        self.model.task()
    }

    fn transcribe(&mut self, audio: &Path, overrides: &GenerationOverrides) -> Result<String> {
        let model = self.model;
        let options = TranscribeOptions::resolve(overrides);
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| Error::NotLoaded(model.name().to_string()))?;

        tracing::debug!("Transcribing {} with {}", audio.display(), model);
        let text = handle
            .transcribe(audio, &options)
            .with_context(|| format!("transcription of {} failed", audio.display()))?;
        Ok(text)
    }
}

fn require_audio_file(input: &AudioInput) -> Result<&Path> {
    match input {
        AudioInput::File(path) if path.as_os_str().is_empty() => Err(Error::invalid_input(
            "audio file path required for transcription",
        )),
        AudioInput::File(path) if !path.is_file() => Err(Error::invalid_input(format!(
            "audio file not found: {}",
            path.display()
        ))),
        AudioInput::File(path) => Ok(path),
        AudioInput::Text(_) => Err(Error::invalid_input(
            "audio file path required for transcription",
        )),
    }
}

fn require_text(input: &AudioInput) -> Result<&str> {
    match input {
        AudioInput::Text(prompt) => validate_prompt(prompt),
        AudioInput::File(_) => Err(Error::invalid_input(
            "text prompt required for speech synthesis",
        )),
    }
}

impl Driver for AudioDriver {
    type Input = AudioInput;

    fn id(&self) -> ModelId {
        ModelId::Audio(self.model)
    }

    fn load(&mut self, options: &LoadOptions) -> Result<()> {
        let repo = self.id().repo_path();
        match self.backend.load_audio(&repo, self.task(), options) {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Successfully loaded ALM model: {}", self.model);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to load ALM model {}: {:#}", self.model, e);
                self.handle = None;
                Err(e.context(format!("failed to load {}", repo)).into())
            }
        }
    }

    fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    fn config(&self) -> &GenerationOverrides {
        &self.config
    }

    fn generate(&mut self, input: &AudioInput, overrides: &GenerationOverrides) -> Result<String> {
        if !self.is_loaded() {
            return Err(Error::NotLoaded(self.model.name().to_string()));
        }

        match self.task() {
            AudioTask::Transcription => {
                let path = require_audio_file(input)?;
                self.transcribe(path, overrides)
            }
            AudioTask::Synthesis => {
                require_text(input)?;
                Err(Error::not_implemented(format!(
                    "speech synthesis with {}",
                    self.model
                )))
            }
        }
    }

    /// Transcription has no incremental mode, so the full result arrives as one fragment.
    fn stream<'a>(
        &'a mut self,
        input: &AudioInput,
        overrides: &GenerationOverrides,
    ) -> Result<FragmentStream<'a>> {
        match self.task() {
            AudioTask::Transcription => {
                let text = self.generate(input, overrides)?;
                Ok(Box::new(std::iter::once(Ok(text))))
            }
            AudioTask::Synthesis => {
                if !self.is_loaded() {
                    return Err(Error::NotLoaded(self.model.name().to_string()));
                }
                require_text(input)?;
                Err(Error::not_implemented(format!(
                    "streaming speech synthesis with {}",
                    self.model
                )))
            }
        }
    }
}
