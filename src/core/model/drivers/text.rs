use std::sync::Arc;

use anyhow::Context;

use super::{validate_prompt, Driver};
use crate::core::model::catalog::TextModel;
use crate::core::model::config::{GenerationOverrides, GenerationParams, LoadOptions};
use crate::core::model::traits::{ChatMessage, FragmentStream, InferenceBackend, TextHandle};
use crate::core::model::ModelId;
use crate::core::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextPrompt {
    pub prompt: String,
    pub system_prompt: Option<String>,
}

impl TextPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
        }
    }

    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

impl From<&str> for TextPrompt {
    fn from(prompt: &str) -> Self {
        Self::new(prompt)
    }
}

impl From<String> for TextPrompt {
    fn from(prompt: String) -> Self {
        Self::new(prompt)
    }
}

pub struct TextDriver {
    model: TextModel,
    backend: Arc<dyn InferenceBackend>,
    config: GenerationOverrides,
    handle: Option<Box<dyn TextHandle>>,
}

impl TextDriver {
    pub fn new(
        model: TextModel,
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

    pub fn model(&self) -> TextModel {
        self.model
    }

    /// Resolves the handle, formats the conversation and merges options for one call.
    fn prepare(
        &mut self,
        input: &TextPrompt,
        overrides: &GenerationOverrides,
    ) -> Result<(&mut Box<dyn TextHandle>, String, GenerationParams)> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| Error::NotLoaded(self.model.name().to_string()))?;
        let prompt = validate_prompt(&input.prompt)?;

        let messages = ChatMessage::conversation(input.system_prompt.as_deref(), prompt);
        let formatted = handle
            .apply_chat_template(&messages)
            .with_context(|| format!("failed to apply chat template for {}", self.model))?;
        let params = GenerationParams::resolve(&self.config, overrides);

        Ok((handle, formatted, params))
    }
}

impl Driver for TextDriver {
    type Input = TextPrompt;

    fn id(&self) -> ModelId {
        ModelId::Text(self.model)
    }

    fn load(&mut self, options: &LoadOptions) -> Result<()> {
        let repo = self.id().repo_path();
        match self.backend.load_text(&repo, options) {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Successfully loaded text model: {}", self.model);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to load text model {}: {:#}", self.model, e);
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

    fn generate(&mut self, input: &TextPrompt, overrides: &GenerationOverrides) -> Result<String> {
        let model = self.model;
        let (handle, formatted, params) = self.prepare(input, overrides)?;
        tracing::debug!("Generating with {} (max_tokens={})", model, params.max_tokens);

        let text = handle
            .generate(&formatted, &params)
            .with_context(|| format!("generation failed for {}", model))?;
        Ok(text)
    }

    fn stream<'a>(
        &'a mut self,
        input: &TextPrompt,
        overrides: &GenerationOverrides,
    ) -> Result<FragmentStream<'a>> {
        let model = self.model;
        let (handle, formatted, params) = self.prepare(input, overrides)?;
        tracing::debug!("Streaming with {}", model);

        let stream = handle
            .stream(&formatted, &params)
            .with_context(|| format!("streaming failed for {}", model))?;
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::drivers::testing::ScriptedBackend;

    fn driver(backend: ScriptedBackend) -> TextDriver {
        TextDriver::new(TextModel::SmolLm17bFp16, Arc::new(backend), None)
    }

    #[test]
    fn test_generate_before_load() {
        let mut driver = driver(ScriptedBackend::new());
        let err = driver
            .generate(&"hello".into(), &GenerationOverrides::new())
            .unwrap_err();
        assert!(matches!(err, Error::NotLoaded(name) if name == "SmolLM-1.7B-fp16"));

        assert!(matches!(
            driver.stream(&"hello".into(), &GenerationOverrides::new()),
            Err(Error::NotLoaded(_))
        ));
    }

    #[test]
    fn test_generate_formats_and_merges() {
        let mut driver = TextDriver::new(
            TextModel::SmolLm17bFp16,
            Arc::new(ScriptedBackend::new()),
            Some(GenerationOverrides::new().max_tokens(64)),
        );
        driver.load(&LoadOptions::default()).unwrap();
        assert!(driver.is_loaded());

        let out = driver
            .generate(
                &TextPrompt::new("What is Rust?").with_system("Be brief."),
                &GenerationOverrides::new(),
            )
            .unwrap();
        assert_eq!(
            out,
            "mlx-community/SmolLM-1.7B-fp16|<system>Be brief.<user>What is Rust?|64"
        );

        let out = driver
            .generate(&"hi".into(), &GenerationOverrides::new().max_tokens(8))
            .unwrap();
        assert!(out.ends_with("|8"));
    }

    #[test]
    fn test_empty_prompt_is_invalid() {
        let mut driver = driver(ScriptedBackend::new());
        driver.load(&LoadOptions::default()).unwrap();
        let err = driver
            .generate(&"   ".into(), &GenerationOverrides::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_load_failure_propagates() {
        let mut driver = driver(ScriptedBackend::new().fail_load("mlx-community/SmolLM-1.7B-fp16"));
        let err = driver.load(&LoadOptions::default()).unwrap_err();
        assert!(err.is_external());
        assert!(!driver.is_loaded());
        assert!(!driver.info().loaded);
    }

    #[test]
    fn test_stream_is_lazy() {
        let backend = ScriptedBackend::new();
        let calls = Arc::clone(&backend.calls);
        let mut driver = driver(backend);
        driver.load(&LoadOptions::default()).unwrap();

        let mut stream = driver
            .stream(&"one two three".into(), &GenerationOverrides::new())
            .unwrap();
        let fragments_seen = || {
            calls
                .lock()
                .iter()
                .filter(|c| c.starts_with("fragment"))
                .count()
        };
        assert_eq!(fragments_seen(), 0);

        assert_eq!(stream.next().unwrap().unwrap(), "<user>one");
        assert_eq!(fragments_seen(), 1);

        let rest: Vec<String> = stream.map(|f| f.unwrap()).collect();
        assert_eq!(rest, vec!["two", "three"]);
    }

    #[test]
    fn test_batch_generate_stops_at_first_failure() {
        let mut driver = driver(ScriptedBackend::new().fail_prompt("bad"));
        driver.load(&LoadOptions::default()).unwrap();

        let ok = driver
            .batch_generate(&["a".into(), "b".into()], &GenerationOverrides::new())
            .unwrap();
        assert_eq!(ok.len(), 2);
        assert!(ok[0].contains("<user>a"));
        assert!(ok[1].contains("<user>b"));

        let err = driver
            .batch_generate(&["a".into(), "bad".into(), "c".into()], &GenerationOverrides::new())
            .unwrap_err();
        assert!(err.is_external());
    }
}
