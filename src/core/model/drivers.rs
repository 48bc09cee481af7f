pub mod audio;
pub mod text;
pub mod vision;

pub use audio::{AudioDriver, AudioInput};
pub use text::{TextDriver, TextPrompt};
pub use vision::{VisionDriver, VisionPrompt};

use super::config::{GenerationOverrides, LoadOptions};
use super::traits::FragmentStream;
use super::{ModelId, ModelInfo};
use crate::core::{Error, Result};

/// Common surface of the per-category facades.
///
/// Every facade owns at most one backend handle. `generate` and `stream` fail with
/// [`Error::NotLoaded`] until `load` has succeeded.
pub trait Driver {
    type Input;

    fn id(&self) -> ModelId;

    fn load(&mut self, options: &LoadOptions) -> Result<()>;

    fn is_loaded(&self) -> bool;

    /// Options stored on the facade, layered between the defaults and call-time overrides.
    fn config(&self) -> &GenerationOverrides;

    fn generate(&mut self, input: &Self::Input, overrides: &GenerationOverrides) -> Result<String>;

    fn stream<'a>(
        &'a mut self,
        input: &Self::Input,
        overrides: &GenerationOverrides,
    ) -> Result<FragmentStream<'a>>;

    /// Runs `generate` over `inputs` in order. The first failure aborts the batch.
    fn batch_generate(
        &mut self,
        inputs: &[Self::Input],
        overrides: &GenerationOverrides,
    ) -> Result<Vec<String>> {
        inputs
            .iter()
            .map(|input| self.generate(input, overrides))
            .collect()
    }

    fn info(&self) -> ModelInfo {
        let id = self.id();
        ModelInfo {
            name: id.name().to_string(),
            kind: id.kind(),
            repo_path: id.repo_path(),
            loaded: self.is_loaded(),
            config: self.config().clone(),
        }
    }
}

pub(crate) fn validate_prompt(prompt: &str) -> Result<&str> {
    if prompt.trim().is_empty() {
        return Err(Error::invalid_input("prompt cannot be empty"));
    }
    Ok(prompt)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted backend shared by the facade and registry unit tests.

    use crate::core::model::catalog::AudioTask;
    use crate::core::model::config::{GenerationParams, LoadOptions, TranscribeOptions};
    use crate::core::model::traits::{
        AudioHandle, ChatMessage, FragmentStream, InferenceBackend, TextHandle, VisionHandle,
    };
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    #[derive(Default)]
    pub struct ScriptedBackend {
        pub failing_loads: HashSet<String>,
        pub failing_prompts: HashSet<String>,
        pub calls: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_load(mut self, repo: &str) -> Self {
            self.failing_loads.insert(repo.to_string());
            self
        }

        pub fn fail_prompt(mut self, prompt: &str) -> Self {
            self.failing_prompts.insert(prompt.to_string());
            self
        }

        fn check_load(&self, repo: &str) -> anyhow::Result<()> {
            self.calls.lock().push(format!("load {}", repo));
            if self.failing_loads.contains(repo) {
                anyhow::bail!("repository {} not found", repo);
            }
            Ok(())
        }
    }

    fn render(messages: &[ChatMessage]) -> String {
        messages
            .iter()
            .map(|m| format!("<{}>{}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("")
    }

    pub struct ScriptedText {
        repo: String,
        failing_prompts: HashSet<String>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl TextHandle for ScriptedText {
        fn apply_chat_template(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
            Ok(render(messages))
        }

        fn generate(&mut self, prompt: &str, params: &GenerationParams) -> anyhow::Result<String> {
            self.calls.lock().push(format!("generate {} {}", self.repo, prompt));
            if self.failing_prompts.iter().any(|p| prompt.contains(p.as_str())) {
                anyhow::bail!("generation failed for {}", prompt);
            }
            Ok(format!("{}|{}|{}", self.repo, prompt, params.max_tokens))
        }

        fn stream<'a>(
            &'a mut self,
            prompt: &str,
            _params: &GenerationParams,
        ) -> anyhow::Result<FragmentStream<'a>> {
            let calls = Arc::clone(&self.calls);
            let words: Vec<String> = prompt.split_whitespace().map(String::from).collect();
            Ok(Box::new(words.into_iter().map(move |w| {
                calls.lock().push(format!("fragment {}", w));
                Ok(w)
            })))
        }
    }

    pub struct ScriptedVision {
        repo: String,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl VisionHandle for ScriptedVision {
        fn apply_chat_template(
            &self,
            messages: &[ChatMessage],
            num_images: usize,
        ) -> anyhow::Result<String> {
            Ok(format!("{}[images={}]", render(messages), num_images))
        }

        fn generate(
            &mut self,
            prompt: &str,
            images: &[PathBuf],
            _params: &GenerationParams,
        ) -> anyhow::Result<String> {
            self.calls.lock().push(format!("generate {} {}", self.repo, prompt));
            Ok(format!("{}|{}|{}", self.repo, prompt, images.len()))
        }

        fn stream<'a>(
            &'a mut self,
            prompt: &str,
            images: &[PathBuf],
            _params: &GenerationParams,
        ) -> anyhow::Result<FragmentStream<'a>> {
            let fragments = vec![prompt.to_string(), images.len().to_string()];
            Ok(Box::new(fragments.into_iter().map(Ok)))
        }
    }

    pub struct ScriptedAudio {
        repo: String,
    }

    impl AudioHandle for ScriptedAudio {
        fn transcribe(&mut self, audio: &Path, options: &TranscribeOptions) -> anyhow::Result<String> {
            Ok(format!(
                "{}|{}|{}",
                self.repo,
                audio.file_name().and_then(|n| n.to_str()).unwrap_or_default(),
                options.language.as_deref().unwrap_or("auto")
            ))
        }
    }

    impl InferenceBackend for ScriptedBackend {
        fn load_text(&self, repo: &str, _options: &LoadOptions) -> anyhow::Result<Box<dyn TextHandle>> {
            self.check_load(repo)?;
            Ok(Box::new(ScriptedText {
                repo: repo.to_string(),
                failing_prompts: self.failing_prompts.clone(),
                calls: Arc::clone(&self.calls),
            }))
        }

        fn load_vision(
            &self,
            repo: &str,
            _options: &LoadOptions,
        ) -> anyhow::Result<Box<dyn VisionHandle>> {
            self.check_load(repo)?;
            Ok(Box::new(ScriptedVision {
                repo: repo.to_string(),
                calls: Arc::clone(&self.calls),
            }))
        }

        fn load_audio(
            &self,
            repo: &str,
            _task: AudioTask,
            _options: &LoadOptions,
        ) -> anyhow::Result<Box<dyn AudioHandle>> {
            self.check_load(repo)?;
            Ok(Box::new(ScriptedAudio {
                repo: repo.to_string(),
            }))
        }
    }
}
