use thiserror::Error;

pub type Result<T> = std::result::Result<T, HistogramError>;

#[derive(Debug, Error)]
pub enum HistogramError {
    #[error("invalid histogram parameters: {0}")]
    InvalidParameters(String),

    #[error("histogram export I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("spreadsheet container failure: {0}")]
    Spreadsheet(#[from] zip::result::ZipError),
}
