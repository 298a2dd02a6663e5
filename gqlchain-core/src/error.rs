//! Wire codec errors.

use thiserror::Error;

/// Errors produced while encoding a request or decoding a response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The request could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// The response body was not a GraphQL response.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The document text was required but the operation carries only a hash.
    #[error("operation `{operation}` has no document text to send")]
    MissingDocument { operation: String },
}

impl CodecError {
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}
