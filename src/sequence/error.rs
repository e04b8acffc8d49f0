use thiserror::Error;

use crate::model::{CoreError, DataType};

pub type Result<T> = std::result::Result<T, SequenceError>;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("incompatible plane: {0}")]
    IncompatibleData(String),

    #[error("request of {requested} elements exceeds the addressable capacity")]
    CapacityExceeded { requested: u64 },

    #[error("sample type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: DataType,
        actual: DataType,
    },

    #[error("not enough memory: {0}")]
    ResourceExhausted(String),

    #[error("position out of bounds: {0}")]
    OutOfBounds(String),

    #[error("image provider failure: {0}")]
    Provider(String),

    #[error("metadata persistence failure: {0}")]
    Persistence(String),

    #[error("volatile storage I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata serialization failure: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("model error: {0}")]
    Core(#[from] CoreError),
}
