use thiserror::Error;

/// Type alias for Result with TriageError
pub type Result<T> = std::result::Result<T, TriageError>;

/// Error types for the document triage pipeline
#[derive(Error, Debug)]
pub enum TriageError {
    /// Configuration file could not be read, parsed, or validated
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rules file is malformed (bad YAML, duplicate keys, empty pattern lists)
    #[error("Rules error: {0}")]
    Rules(String),

    /// A regex pattern in a rule failed to compile
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Year field has a length other than 2 or 4 during filename synthesis
    #[error("Invalid year format: {0:?}")]
    InvalidYearFormat(String),

    /// Text extraction failed (converter exited nonzero, timed out, or
    /// produced undecodable output)
    #[error("Extraction failed for {path}: {reason}")]
    Extraction {
        path: String,
        reason: String,
        retryable: bool,
    },

    /// Outbound delivery failed
    #[error("Delivery to {recipient} failed: {reason}")]
    Delivery {
        recipient: String,
        reason: String,
        retryable: bool,
    },

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TriageError {
    /// Check if the error is transient and worth retrying on a later pass
    pub fn is_transient(&self) -> bool {
        match self {
            TriageError::Extraction { retryable, .. } => *retryable,
            TriageError::Delivery { retryable, .. } => *retryable,
            TriageError::Io(_) => true,
            _ => false,
        }
    }

    /// Check if the error is permanent and should not be retried
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}
