use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuoteFlowError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QuoteFlowError>;
