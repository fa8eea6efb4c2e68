//! Error types for the binary translator's object disassembler.

use thiserror::Error;

/// Main error type for CFG recovery operations.
#[derive(Debug, Error)]
pub enum BinliftError {
    /// Binary format parsing errors (bad magic, truncated header, unsupported CPU type)
    #[error("Invalid binary format: {0}")]
    InvalidFormat(String),

    /// Parse error with location information
    #[error("Parse error at offset {offset:#x}: {message}")]
    ParseError { offset: u64, message: String },

    /// Analysis timeout
    #[error("Analysis timeout after {seconds}s")]
    Timeout { seconds: u64 },

    /// Resource limit exceeded
    #[error("Resource limit exceeded: {resource} ({used}/{limit})")]
    ResourceExhausted {
        resource: String,
        used: usize,
        limit: usize,
    },

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Architecture not supported
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Address calculation errors
    #[error("Address error: {0}")]
    AddressError(String),

    /// Symbol resolution errors
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for disassembler operations.
pub type Result<T> = std::result::Result<T, BinliftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BinliftError::InvalidFormat("Unknown magic bytes".to_string());
        assert_eq!(err.to_string(), "Invalid binary format: Unknown magic bytes");

        let err = BinliftError::ParseError {
            offset: 0x1234,
            message: "Invalid header".to_string(),
        };
        assert_eq!(err.to_string(), "Parse error at offset 0x1234: Invalid header");
    }
}
