use thiserror::Error;

pub type Result<T> = std::result::Result<T, PluginError>;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("repository '{location}' is unreachable: {reason}")]
    Unreachable { location: String, reason: String },

    #[error("malformed repository document from '{location}': {reason}")]
    Malformed { location: String, reason: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid version '{0}'")]
    InvalidVersion(String),
}

impl PluginError {
    /// Failures that only disqualify the repository being read.
    pub fn skips_repository(&self) -> bool {
        matches!(
            self,
            PluginError::Unreachable { .. } | PluginError::Malformed { .. }
        )
    }
}
