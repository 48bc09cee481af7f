use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use super::{validate_prompt, Driver};
use crate::core::model::catalog::VisionModel;
use crate::core::model::config::{GenerationOverrides, GenerationParams, LoadOptions};
use crate::core::model::traits::{ChatMessage, FragmentStream, InferenceBackend, VisionHandle};
use crate::core::model::ModelId;
use crate::core::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisionPrompt {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub images: Vec<PathBuf>,
}

impl VisionPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn image(mut self, path: impl Into<PathBuf>) -> Self {
        self.images.push(path.into());
        self
    }

    pub fn images<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.images.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

pub struct VisionDriver {
    model: VisionModel,
    backend: Arc<dyn InferenceBackend>,
    config: GenerationOverrides,
    handle: Option<Box<dyn VisionHandle>>,
}

struct PreparedCall<'a> {
    handle: &'a mut Box<dyn VisionHandle>,
    formatted: String,
    images: Vec<PathBuf>,
    params: GenerationParams,
}

impl VisionDriver {
    pub fn new(
        model: VisionModel,
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

    pub fn model(&self) -> VisionModel {
        self.model
    }

    fn prepare(
        &mut self,
        input: &VisionPrompt,
        overrides: &GenerationOverrides,
    ) -> Result<PreparedCall<'_>> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| Error::NotLoaded(self.model.name().to_string()))?;
        let prompt = validate_prompt(&input.prompt)?;
        let images = existing_images(&input.images);

        let messages = ChatMessage::conversation(input.system_prompt.as_deref(), prompt);
        let formatted = handle
            .apply_chat_template(&messages, images.len())
            .with_context(|| format!("failed to apply chat template for {}", self.model))?;
        let params = GenerationParams::resolve(&self.config, overrides);

        Ok(PreparedCall {
            handle,
            formatted,
            images,
            params,
        })
    }
}

/// Keeps the paths that exist on disk. Missing images are reported and skipped.
fn existing_images(images: &[PathBuf]) -> Vec<PathBuf> {
    images
        .iter()
        .filter(|path| {
            let found = path.is_file();
            if !found {
                tracing::warn!("Image not found: {}", path.display());
            }
            found
        })
        .cloned()
        .collect()
}

impl Driver for VisionDriver {
    type Input = VisionPrompt;

    fn id(&self) -> ModelId {
        ModelId::Vision(self.model)
    }

    fn load(&mut self, options: &LoadOptions) -> Result<()> {
        let repo = self.id().repo_path();
        match self.backend.load_vision(&repo, options) {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Successfully loaded VLM: {}", self.model);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to load VLM {}: {:#}", self.model, e);
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

    fn generate(&mut self, input: &VisionPrompt, overrides: &GenerationOverrides) -> Result<String> {
        let model = self.model;
        let PreparedCall {
            handle,
            formatted,
            images,
            params,
        } = self.prepare(input, overrides)?;
        tracing::debug!("Generating with {} over {} image(s)", model, images.len());

        let text = handle
            .generate(&formatted, &images, &params)
            .with_context(|| format!("generation failed for {}", model))?;
        Ok(text)
    }

    fn stream<'a>(
        &'a mut self,
        input: &VisionPrompt,
        overrides: &GenerationOverrides,
    ) -> Result<FragmentStream<'a>> {
        let model = self.model;
        let PreparedCall {
            handle,
            formatted,
            images,
            params,
        } = self.prepare(input, overrides)?;

        let stream = handle
            .stream(&formatted, &images, &params)
            .with_context(|| format!("streaming failed for {}", model))?;
        Ok(stream)
    }
}
