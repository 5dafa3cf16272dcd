//! Error types for the Pokesync engine.

use thiserror::Error;

/// All possible errors from the Pokesync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Capture payload errors
    #[error("malformed capture: {0}")]
    MalformedCapture(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    // State errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("unsupported snapshot version: expected at most {supported}, got {actual}")]
    UnsupportedSnapshotVersion { supported: u32, actual: u32 },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::MissingRequiredField("pokemon_id".into());
        assert_eq!(err.to_string(), "missing required field: pokemon_id");

        let err = Error::UnsupportedSnapshotVersion {
            supported: 1,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "unsupported snapshot version: expected at most 1, got 3"
        );

        let err = Error::UnsupportedAction("trade".into());
        assert_eq!(err.to_string(), "unsupported action: trade");
    }
}
