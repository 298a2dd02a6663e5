//! Request and response contexts threaded through an interceptor chain.

use bytes::Bytes;
use gqlchain_core::Operation;
use http::{HeaderMap, StatusCode};

use crate::result::GraphQLResult;

/// The mutable request state handed from interceptor to interceptor.
///
/// Interceptors receive the context by value and pass it on (possibly
/// modified) when they proceed or retry.
#[derive(Clone, Debug)]
pub struct RequestContext {
    /// The operation being executed.
    pub operation: Operation,
    /// Per-request headers, applied after the configured additional headers.
    pub headers: HeaderMap,
    attempt: u32,
    persisted_query_retry: bool,
}

impl RequestContext {
    /// Create a context for the first attempt of `operation`.
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            headers: HeaderMap::new(),
            attempt: 1,
            persisted_query_retry: false,
        }
    }

    /// Set per-request headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// The 1-based attempt number. Incremented on every retry.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Number of retries performed so far.
    pub fn retries(&self) -> u32 {
        self.attempt.saturating_sub(1)
    }

    /// Whether this attempt re-sends the document after a persisted-query
    /// miss.
    pub fn is_persisted_query_retry(&self) -> bool {
        self.persisted_query_retry
    }

    /// Mark this request as a persisted-query retry, so the next attempt
    /// carries the full document.
    pub fn mark_persisted_query_retry(&mut self) {
        self.persisted_query_retry = true;
    }

    pub(crate) fn next_attempt(mut self) -> Self {
        self.attempt = self.attempt.saturating_add(1);
        self
    }
}

/// An HTTP response received by network-fetch, plus the parsed result once
/// json-parsing has run.
#[derive(Clone, Debug)]
pub struct ResponseContext {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    parsed: Option<GraphQLResult>,
}

impl ResponseContext {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            parsed: None,
        }
    }

    /// Convert a raw HTTP response.
    pub fn from_http(response: http::Response<Bytes>) -> Self {
        let (parts, body) = response.into_parts();
        Self::new(parts.status, parts.headers, body)
    }

    /// The parsed result, if json-parsing has run.
    pub fn parsed(&self) -> Option<&GraphQLResult> {
        self.parsed.as_ref()
    }

    /// Attach the parsed result.
    pub fn set_parsed(&mut self, result: GraphQLResult) {
        self.parsed = Some(result);
    }

    /// Attach the parsed result, builder style.
    pub fn with_parsed(mut self, result: GraphQLResult) -> Self {
        self.parsed = Some(result);
        self
    }

    pub(crate) fn into_parsed(self) -> Option<GraphQLResult> {
        self.parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_context_attempts() {
        let ctx = RequestContext::new(Operation::query("Hero", "query Hero { hero { name } }"));
        assert_eq!(ctx.attempt(), 1);
        assert_eq!(ctx.retries(), 0);

        let ctx = ctx.next_attempt().next_attempt();
        assert_eq!(ctx.attempt(), 3);
        assert_eq!(ctx.retries(), 2);
    }

    #[test]
    fn test_persisted_query_retry_flag() {
        let mut ctx = RequestContext::new(Operation::query("Hero", "query Hero { hero { name } }"));
        assert!(!ctx.is_persisted_query_retry());
        ctx.mark_persisted_query_retry();
        assert!(ctx.next_attempt().is_persisted_query_retry());
    }

    #[test]
    fn test_response_from_http() {
        let response = http::Response::builder()
            .status(StatusCode::CREATED)
            .header("x-request-id", "abc")
            .body(Bytes::from_static(b"{}"))
            .unwrap();
        let ctx = ResponseContext::from_http(response);
        assert_eq!(ctx.status, StatusCode::CREATED);
        assert_eq!(ctx.headers.get("x-request-id").unwrap(), "abc");
        assert!(ctx.parsed().is_none());
    }
}
