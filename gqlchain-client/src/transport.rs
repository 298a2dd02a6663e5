//! HTTP transport layer for the network-fetch stage.
//!
//! The pipeline sends requests through the [`Transport`] capability. The
//! default implementation is [`HyperTransport`], built on hyper_util's legacy
//! client. It supports:
//!
//! - HTTP/1.1 and HTTP/2 with automatic protocol negotiation
//! - TLS with rustls (feature-gated)
//! - Connection pooling
//! - Tower service integration
//!
//! # Feature Flags
//!
//! TLS support requires enabling the appropriate features:
//!
//! - `tls` (default) - Enables `tls-ring` + `tls-native-roots` for convenience
//! - `tls-ring` / `tls-aws-lc` - Crypto providers
//! - `tls-native-roots` / `tls-webpki-roots` - Root certificates
//!
//! # Example
//!
//! ```ignore
//! use gqlchain_client::transport::HyperTransport;
//! use std::time::Duration;
//!
//! let transport = HyperTransport::builder()
//!     .pool_idle_timeout(Duration::from_secs(60))
//!     .build()?;
//! ```

use bytes::Bytes;

use crate::PipelineError;
use crate::interceptor::BoxFuture;

mod connector;
mod hyper;

pub use connector::{build_https_connector, has_tls_support};

#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
pub use connector::default_tls_config;

pub use hyper::{HyperTransport, HyperTransportBuilder};

// Re-export rustls types that users might need for TLS configuration
pub use rustls::ClientConfig as TlsClientConfig;

/// Send-request capability.
///
/// Implementations are shared by every chain of a client and must be
/// cancel-safe: the network-fetch stage drops the returned future when the
/// chain is cancelled or the request times out.
pub trait Transport: Send + Sync {
    /// Send a request and collect the full response body.
    ///
    /// Only connectivity failures are errors; any HTTP status is a response.
    fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> BoxFuture<'_, Result<http::Response<Bytes>, PipelineError>>;
}
