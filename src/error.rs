/// Error types for the rifty library
use std::fmt;

/// Result type alias for rifty operations
pub type Result<T> = std::result::Result<T, RiftyError>;

/// Main error type for rifty operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiftyError {
    /// I/O errors
    Io(String),

    /// FASTA parsing errors
    Fasta(String),

    /// Malformed locate/dump record
    Record(String),

    /// Worker pool errors (e.g. submit after shutdown)
    Pool(String),
}

impl fmt::Display for RiftyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiftyError::Io(msg) => write!(f, "I/O error: {}", msg),
            RiftyError::Fasta(msg) => write!(f, "FASTA error: {}", msg),
            RiftyError::Record(msg) => write!(f, "Record error: {}", msg),
            RiftyError::Pool(msg) => write!(f, "Pool error: {}", msg),
        }
    }
}

impl std::error::Error for RiftyError {}

impl From<std::io::Error> for RiftyError {
    fn from(err: std::io::Error) -> Self {
        RiftyError::Io(err.to_string())
    }
}
