//! Per-fetch options.

use gqlchain_core::CachePolicy;
use http::{HeaderMap, HeaderName, HeaderValue};

/// Options for configuring an individual fetch.
///
/// # Example
///
/// ```ignore
/// use gqlchain_client::{CachePolicy, CallOptions};
///
/// let options = CallOptions::new()
///     .header("authorization", "Bearer token123")
///     .cache_policy(CachePolicy::FetchIgnoringCache);
///
/// let response = client.fetch_with_options(op, options)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Headers added to the request context for this fetch.
    pub(crate) headers: HeaderMap,
    /// Overrides the operation's cache policy.
    pub(crate) cache_policy: Option<CachePolicy>,
}

impl CallOptions {
    /// Create new default call options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the operation's cache policy for this fetch.
    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = Some(policy);
        self
    }

    /// Get the cache policy override, if any.
    pub fn get_cache_policy(&self) -> Option<CachePolicy> {
        self.cache_policy
    }

    /// Add a header for this fetch.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        V::Error: std::fmt::Debug,
    {
        let name = name.try_into().expect("invalid header name");
        let value = value.try_into().expect("invalid header value");
        self.headers.insert(name, value);
        self
    }

    /// Try to add a header for this fetch.
    ///
    /// Returns `None` if the header name or value is invalid.
    pub fn try_header<K, V>(mut self, name: K, value: V) -> Option<Self>
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        let name = name.try_into().ok()?;
        let value = value.try_into().ok()?;
        self.headers.insert(name, value);
        Some(self)
    }

    /// Set all headers for this fetch, replacing any existing ones.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Get a reference to the headers.
    pub fn get_headers(&self) -> &HeaderMap {
        &self.headers
    }
}
