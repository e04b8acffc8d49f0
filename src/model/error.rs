use thiserror::Error;

use super::DataType;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("invalid sample count: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("sample type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: DataType,
        actual: DataType,
    },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
}
