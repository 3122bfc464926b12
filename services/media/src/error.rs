use thiserror::Error;

/// Errors raised while storing, validating or processing uploads
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("File is not a recognized video container")]
    InvalidVideo,

    #[error("{tool} failed: {message}")]
    Tool { tool: &'static str, message: String },

    #[error("Failed to parse probe output: {0}")]
    Probe(#[from] serde_json::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;
