use super::catalog::AudioTask;
use super::config::{GenerationParams, LoadOptions, TranscribeOptions};
use std::fmt;
use std::path::{Path, PathBuf};

/// Lazily produced output fragments. Each item is pulled from the backend on demand.
pub type FragmentStream<'a> = Box<dyn Iterator<Item = anyhow::Result<String>> + 'a>;

/// Entry point into the inference library: turns a repository path into loaded handles.
pub trait InferenceBackend: Send + Sync {
    fn load_text(&self, repo: &str, options: &LoadOptions) -> anyhow::Result<Box<dyn TextHandle>>;

    fn load_vision(
        &self,
        repo: &str,
        options: &LoadOptions,
    ) -> anyhow::Result<Box<dyn VisionHandle>>;

    fn load_audio(
        &self,
        repo: &str,
        task: AudioTask,
        options: &LoadOptions,
    ) -> anyhow::Result<Box<dyn AudioHandle>>;
}

/// A loaded language model together with its tokenizer.
pub trait TextHandle: Send {
    fn apply_chat_template(&self, messages: &[ChatMessage]) -> anyhow::Result<String>;

    fn generate(&mut self, prompt: &str, params: &GenerationParams) -> anyhow::Result<String>;

    fn stream<'a>(
        &'a mut self,
        prompt: &str,
        params: &GenerationParams,
    ) -> anyhow::Result<FragmentStream<'a>>;
}

/// A loaded vision-language model together with its processor.
pub trait VisionHandle: Send {
    fn apply_chat_template(
        &self,
        messages: &[ChatMessage],
        num_images: usize,
    ) -> anyhow::Result<String>;

    fn generate(
        &mut self,
        prompt: &str,
        images: &[PathBuf],
        params: &GenerationParams,
    ) -> anyhow::Result<String>;

    fn stream<'a>(
        &'a mut self,
        prompt: &str,
        images: &[PathBuf],
        params: &GenerationParams,
    ) -> anyhow::Result<FragmentStream<'a>>;
}

/// A loaded audio model. Only the recognition direction is exposed by the library.
pub trait AudioHandle: Send {
    fn transcribe(&mut self, audio: &Path, options: &TranscribeOptions) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Builds the conversation for a single turn: an optional system instruction, then the user prompt.
    pub fn conversation(system_prompt: Option<&str>, prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt.filter(|s| !s.trim().is_empty()) {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        messages
    }
}
