use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::config::{GenerationOverrides, LoadOptions};
use super::factory::{LoadedModel, ModelRequest};
use super::traits::{FragmentStream, InferenceBackend};
use super::ModelId;
use crate::app::events::{Event, EventBus, EventHandler};
use crate::config::DEFAULT_CACHE_DIR;
use crate::core::{Error, Result};
use crate::envconfig::expand_home;

/// Loads facades by identity, caches them by display name and tracks the active one.
///
/// The name map and the active name are only mutated through `&mut self`, so an unload
/// of the active model clears the active reference in the same step.
pub struct ModelRegistry {
    backend: Arc<dyn InferenceBackend>,
    cache_dir: PathBuf,
    load_options: LoadOptions,
    models: HashMap<String, LoadedModel>,
    active: Option<String>,
    events: EventBus,
}

impl ModelRegistry {
    /// Creates the registry and its cache directory (`~/.cache/mlx_models` unless given).
    pub fn new(backend: Arc<dyn InferenceBackend>, cache_dir: Option<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.unwrap_or_else(|| expand_home(DEFAULT_CACHE_DIR));
        std::fs::create_dir_all(&cache_dir)?;
        tracing::debug!("Model cache directory: {}", cache_dir.display());

        Ok(Self {
            backend,
            cache_dir,
            load_options: LoadOptions::default(),
            models: HashMap::new(),
            active: None,
            events: EventBus::new(),
        })
    }

    /// Load options used when `compare_models` or `batch_process` load a model on demand.
    pub fn with_load_options(mut self, options: LoadOptions) -> Self {
        self.load_options = options;
        self
    }

    pub fn with_event_handler<H: EventHandler + 'static>(self, handler: H) -> Self {
        self.events.subscribe(handler);
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn load_model(
        &mut self,
        id: ModelId,
        config: Option<GenerationOverrides>,
        options: &LoadOptions,
    ) -> Result<&mut LoadedModel> {
        let name = id.name();
        tracing::info!("Loading model: {}", name);
        self.events.publish(Event::ModelLoading {
            name: name.to_string(),
            kind: id.kind(),
        });

        let mut model = LoadedModel::create(id, Arc::clone(&self.backend), config);
        if let Err(e) = model.load(options) {
            tracing::error!("Failed to load model {}: {}", name, e);
            self.events.publish(Event::ModelLoadFailed {
                name: name.to_string(),
                error: e.to_string(),
            });
            return Err(e);
        }

        if let Some(previous) = self.models.remove(name) {
            drop(previous);
            tracing::info!("Released previous handle for {}", name);
            self.events.publish(Event::ModelReplaced {
                name: name.to_string(),
            });
        }

        self.active = Some(name.to_string());
        self.events.publish(Event::ModelLoaded {
            name: name.to_string(),
            kind: id.kind(),
        });
        self.events.publish(Event::ActiveModelChanged {
            name: Some(name.to_string()),
        });
        tracing::info!("Successfully loaded: {}", name);

        Ok(self.models.entry(name.to_string()).or_insert(model))
    }

    /// Like [`load_model`](Self::load_model) but resolves the identity from its display name.
    pub fn load_model_by_name(
        &mut self,
        name: &str,
        config: Option<GenerationOverrides>,
        options: &LoadOptions,
    ) -> Result<&mut LoadedModel> {
        let id: ModelId = name.parse().inspect_err(|e| {
            tracing::error!("{}", e);
        })?;
        self.load_model(id, config, options)
    }

    pub fn get_model(&self, name: &str) -> Option<&LoadedModel> {
        self.models.get(name)
    }

    pub fn get_model_mut(&mut self, name: &str) -> Option<&mut LoadedModel> {
        self.models.get_mut(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn list_loaded_models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn unload_model(&mut self, name: &str) -> bool {
        if self.models.remove(name).is_none() {
            return false;
        }

        self.events.publish(Event::ModelUnloaded {
            name: name.to_string(),
        });
        if self.active.as_deref() == Some(name) {
            self.active = None;
            self.events.publish(Event::ActiveModelChanged { name: None });
        }
        tracing::info!("Unloaded model: {}", name);
        true
    }

    pub fn active_model_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn get_active_model(&self) -> Option<&LoadedModel> {
        self.active.as_ref().and_then(|name| self.models.get(name))
    }

    pub fn get_active_model_mut(&mut self) -> Option<&mut LoadedModel> {
        match &self.active {
            Some(name) => self.models.get_mut(name),
            None => None,
        }
    }

    pub fn set_active_model(&mut self, name: &str) -> bool {
        if !self.models.contains_key(name) {
            return false;
        }
        self.active = Some(name.to_string());
        self.events.publish(Event::ActiveModelChanged {
            name: Some(name.to_string()),
        });
        true
    }

    /// Runs `request` against the active model.
    pub fn generate(&mut self, request: &ModelRequest, overrides: &GenerationOverrides) -> Result<String> {
        self.get_active_model_mut()
            .ok_or(Error::NoActiveModel)?
            .generate(request, overrides)
    }

    pub fn stream<'a>(
        &'a mut self,
        request: &ModelRequest,
        overrides: &GenerationOverrides,
    ) -> Result<FragmentStream<'a>> {
        self.get_active_model_mut()
            .ok_or(Error::NoActiveModel)?
            .stream(request, overrides)
    }

    /// Runs one request through several models. A failing model, including one that fails to
    /// load, is recorded as an error without stopping the others.
    pub fn compare_models(
        &mut self,
        ids: &[ModelId],
        request: &ModelRequest,
        overrides: &GenerationOverrides,
    ) -> BTreeMap<String, Result<String>> {
        let mut results = BTreeMap::new();

        for &id in ids {
            let name = id.name();
            let outcome = self
                .ensure_loaded(id)
                .and_then(|model| model.generate(request, overrides));

            if let Err(e) = &outcome {
                tracing::error!("Error with model {}: {}", name, e);
                self.events.publish(Event::InferenceError {
                    model: name.to_string(),
                    error: e.to_string(),
                });
            }
            results.insert(name.to_string(), outcome);
        }

        results
    }

    /// Applies one model to many input records. The output is in input order; a failing record
    /// yields an error in its slot. Only a failure to load the model fails the whole call.
    pub fn batch_process(
        &mut self,
        inputs: &[ModelRequest],
        id: ModelId,
        overrides: &GenerationOverrides,
    ) -> Result<Vec<Result<String>>> {
        let model = self.ensure_loaded(id)?;
        let results: Vec<Result<String>> = inputs
            .iter()
            .map(|input| model.generate(input, overrides))
            .collect();

        for (i, e) in results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().err().map(|e| (i, e)))
        {
            tracing::error!("Error processing input {}: {}", i, e);
            self.events.publish(Event::InferenceError {
                model: id.name().to_string(),
                error: e.to_string(),
            });
        }

        Ok(results)
    }

    fn ensure_loaded(&mut self, id: ModelId) -> Result<&mut LoadedModel> {
        if !self.models.contains_key(id.name()) {
            let options = self.load_options.clone();
            return self.load_model(id, None, &options);
        }
        self.models
            .get_mut(id.name())
            .ok_or_else(|| Error::NotLoaded(id.name().to_string()))
    }
}

/// Renders an outcome of `compare_models` or `batch_process` for display.
pub fn describe_outcome(outcome: &Result<String>) -> String {
    match outcome {
        Ok(text) => text.clone(),
        Err(e) => format!("Error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::drivers::testing::ScriptedBackend;
    use crate::core::model::{TextModel, VisionModel};

    fn registry(backend: ScriptedBackend) -> (tempfile::TempDir, ModelRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            ModelRegistry::new(Arc::new(backend), Some(dir.path().join("cache"))).unwrap();
        (dir, registry)
    }

    #[test]
    fn test_new_creates_cache_dir() {
        let (dir, registry) = registry(ScriptedBackend::new());
        assert!(dir.path().join("cache").is_dir());
        assert_eq!(registry.cache_dir(), dir.path().join("cache"));
    }

    #[test]
    fn test_load_marks_active() {
        let (_dir, mut registry) = registry(ScriptedBackend::new());
        let model = registry
            .load_model(TextModel::SmolLm17bFp16.into(), None, &LoadOptions::default())
            .unwrap();
        assert!(model.is_loaded());

        registry
            .load_model(VisionModel::SmolVlmInstructBf16.into(), None, &LoadOptions::default())
            .unwrap();
        assert_eq!(registry.active_model_name(), Some("SmolVLM-Instruct-bf16"));
        assert_eq!(
            registry.list_loaded_models(),
            vec!["SmolLM-1.7B-fp16", "SmolVLM-Instruct-bf16"]
        );

        assert!(registry.set_active_model("SmolLM-1.7B-fp16"));
        assert!(!registry.set_active_model("Florence-2-large-ft-bf16"));
        assert_eq!(registry.get_active_model().map(|m| m.name()), Some("SmolLM-1.7B-fp16"));
    }

    #[test]
    fn test_unrecognized_name_stores_nothing() {
        let (_dir, mut registry) = registry(ScriptedBackend::new());
        let err = registry
            .load_model_by_name("llama-7b", None, &LoadOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnrecognizedIdentity(_)));
        assert!(registry.list_loaded_models().is_empty());
        assert!(registry.get_active_model().is_none());
    }

    #[test]
    fn test_failed_load_keeps_previous_state() {
        let backend = ScriptedBackend::new().fail_load("mlx-community/QwQ-32B-bf16");
        let (_dir, mut registry) = registry(backend);
        registry
            .load_model(TextModel::SmolLm17bFp16.into(), None, &LoadOptions::default())
            .unwrap();

        assert!(registry
            .load_model(TextModel::Qwq32bBf16.into(), None, &LoadOptions::default())
            .is_err());
        assert_eq!(registry.list_loaded_models(), vec!["SmolLM-1.7B-fp16"]);
        assert_eq!(registry.active_model_name(), Some("SmolLM-1.7B-fp16"));
    }

    #[test]
    fn test_generate_without_active_model() {
        let (_dir, mut registry) = registry(ScriptedBackend::new());
        assert!(matches!(
            registry.generate(&ModelRequest::new("hi"), &GenerationOverrides::new()),
            Err(Error::NoActiveModel)
        ));
    }

    #[test]
    fn test_describe_outcome() {
        assert_eq!(describe_outcome(&Ok("fine".to_string())), "fine");
        assert_eq!(
            describe_outcome(&Err(Error::invalid_input("prompt cannot be empty"))),
            "Error: invalid input: prompt cannot be empty"
        );
    }
}
