//! Error types for mapzip-common.

use thiserror::Error;

/// Common error type for mapzip operations.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer: needed {needed} bytes but only {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    /// Position outside of the underlying buffer.
    #[error("position {position} is outside of buffer of length {len}")]
    OutOfBounds { position: usize, len: usize },

    /// Key and value arrays handed to a map builder differ in length.
    #[error("mismatched map input: {keys} keys but {values} values")]
    MismatchedPairs { keys: usize, values: usize },
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
