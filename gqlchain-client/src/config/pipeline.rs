//! Pipeline-wide configuration shared by the built-in interceptors.

use std::time::Duration;

use http::HeaderMap;

use super::retry::RetryPolicy;

/// Configuration consumed by the default interceptors.
///
/// # Default Values
///
/// - `auto_persist_queries`: false
/// - `use_get_for_queries`: false
/// - `use_get_for_persisted_query_retry`: false
/// - `retry_policy`: [`RetryPolicy::default`] (3 retries)
/// - no additional headers, client identity or timeout
#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    /// Send only the document hash first, falling back to the full document
    /// when the server doesn't know it.
    pub auto_persist_queries: bool,
    /// Send queries with GET.
    pub use_get_for_queries: bool,
    /// Send persisted-query attempts with GET.
    pub use_get_for_persisted_query_retry: bool,
    /// Retry limit and backoff for the retry-limiter stage.
    pub retry_policy: RetryPolicy,
    /// Headers applied to every request.
    pub additional_headers: HeaderMap,
    /// Sent as `apollographql-client-name`.
    pub client_name: Option<String>,
    /// Sent as `apollographql-client-version`.
    pub client_version: Option<String>,
    /// Per-request timeout for the network-fetch stage.
    pub timeout: Option<Duration>,
}

impl PipelineConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum retries allowed by the retry-limiter stage.
    pub fn max_retries(&self) -> u32 {
        self.retry_policy.max_retries
    }
}
