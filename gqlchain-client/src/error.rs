//! Pipeline error types.
//!
//! [`PipelineError`] is the error delivered to the caller's stream, passed to
//! error interceptors and produced by the built-in stages. [`CacheError`] is
//! reported by [`NormalizedCache`](crate::NormalizedCache) implementations,
//! and [`ClientBuildError`] by [`ClientBuilder::build`](crate::ClientBuilder::build).

use gqlchain_core::CodecError;
use http::StatusCode;

/// Errors that can flow through an interceptor chain.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The request could not be sent or no response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("unexpected HTTP status {status}")]
    HttpStatus { status: StatusCode, body: String },

    /// The response body is not a GraphQL response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The operation was retried more often than allowed.
    #[error("operation `{operation}` exceeded {max_retries} retries")]
    MaxRetriesExceeded { operation: String, max_retries: u32 },

    /// The last interceptor proceeded without a parsed result being available.
    #[error("interceptor chain completed without producing a result")]
    ChainExhaustedWithoutResult,

    /// An operation was requested in a chain state that doesn't allow it.
    #[error("invalid chain state: {0}")]
    InvalidState(String),

    /// The request could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// Cache-only policy and nothing cached for the operation.
    #[error("no cached data for `{0}`")]
    CacheMiss(String),
}

impl PipelineError {
    /// Create a transport error.
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a parse error.
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create an invalid state error.
    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Self::InvalidState(message.into())
    }

    /// Returns whether this error signals a defect in the chain itself rather
    /// than a failure of the request.
    ///
    /// ```
    /// use gqlchain_client::PipelineError;
    ///
    /// assert!(PipelineError::ChainExhaustedWithoutResult.is_structural());
    /// assert!(!PipelineError::transport("connection reset").is_structural());
    /// ```
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidState(_) | PipelineError::ChainExhaustedWithoutResult
        )
    }

    /// The HTTP status, for [`PipelineError::HttpStatus`].
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            PipelineError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<CodecError> for PipelineError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Encode(msg) => PipelineError::Encode(msg),
            CodecError::MissingDocument { operation } => PipelineError::Encode(format!(
                "operation `{}` has no document text to send",
                operation
            )),
            CodecError::Decode(msg) => PipelineError::Parse(msg),
        }
    }
}

/// Errors reported by a cache implementation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The stored record could not be read.
    #[error("cache read failed: {0}")]
    Read(String),

    /// The record could not be stored.
    #[error("cache write failed: {0}")]
    Write(String),
}

/// Errors from building a [`GraphqlClient`](crate::GraphqlClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    /// The endpoint is not an absolute `http` or `https` URI.
    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The retry policy is inconsistent.
    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(&'static str),

    /// An additional header could not be converted.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The default transport could not be created.
    #[error("failed to create transport: {0}")]
    Transport(#[source] PipelineError),
}
