pub mod app;
pub mod config;
pub mod core;
pub mod envconfig;
pub mod utils;

pub mod model {
    pub use crate::core::model::*;
}

pub use app::{Event, EventBus, EventHandler, HandlerId, LoggingHandler};
pub use config::{Config, ConfigValue};
pub use core::model::registry::describe_outcome;
pub use core::model::{
    AudioHandle, ChatMessage, Driver, FragmentStream, GenerationOverrides, GenerationParams,
    InferenceBackend, LoadOptions, LoadedModel, ModelInfo, ModelRequest, TextHandle,
    TranscribeOptions, VisionHandle,
};
pub use core::{
    AudioModel, AudioTask, Error, ModelId, ModelKind, ModelRegistry, Result, TextModel,
    VisionModel, REPO_NAMESPACE,
};
