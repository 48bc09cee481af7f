use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("model {0} is not loaded, call load() first")]
    NotLoaded(String),

    #[error("no active model, load or select one first")]
    NoActiveModel,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unrecognized model identity: {0}")]
    UnrecognizedIdentity(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    External(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::NotImplemented(msg.into())
    }

    /// True for failures raised by the backend rather than by this crate's own checks.
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
