pub mod error;
pub mod model;

pub use error::{Error, Result};
pub use model::{
    AudioModel, AudioTask, ModelId, ModelKind, ModelRegistry, TextModel, VisionModel,
    REPO_NAMESPACE,
};
