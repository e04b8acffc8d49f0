use crate::math::HistogramError;
use crate::model::CoreError;
use crate::plugin::PluginError;
use crate::sequence::SequenceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings serialization failure: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("settings YAML serialization failure: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("model error: {0}")]
    Core(#[from] CoreError),

    #[error("sequence error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("plugin repository error: {0}")]
    Plugin(#[from] PluginError),

    #[error("histogram error: {0}")]
    Histogram(#[from] HistogramError),
}
