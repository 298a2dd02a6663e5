//! TLS connector setup for the hyper HTTP client.
//!
//! TLS support requires both a crypto provider and root certificates:
//!
//! - **Crypto providers** (choose one): `tls-ring` (default with `tls`) or
//!   `tls-aws-lc`. Without either, a globally installed rustls provider is
//!   used if present.
//! - **Root certificates** (choose one): `tls-native-roots` (default with
//!   `tls`) or `tls-webpki-roots`.

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::ClientConfig;

use crate::PipelineError;

/// Check if TLS features are properly configured.
///
/// Returns true if both a crypto provider AND root certificates are available.
#[inline]
pub const fn has_tls_support() -> bool {
    cfg!(any(feature = "tls-ring", feature = "tls-aws-lc"))
        && cfg!(any(
            feature = "tls-native-roots",
            feature = "tls-webpki-roots"
        ))
}

/// Get a config builder for the first available crypto provider.
///
/// Priority: feature-gated ring, feature-gated aws-lc, then the global
/// default installed by the application.
#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
fn crypto_provider_builder() -> Option<rustls::ConfigBuilder<ClientConfig, rustls::WantsVerifier>> {
    #[cfg(feature = "tls-ring")]
    let provider = Some(std::sync::Arc::new(rustls::crypto::ring::default_provider()));

    #[cfg(all(feature = "tls-aws-lc", not(feature = "tls-ring")))]
    let provider = Some(std::sync::Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

    #[cfg(not(any(feature = "tls-ring", feature = "tls-aws-lc")))]
    let provider = rustls::crypto::CryptoProvider::get_default().cloned();

    ClientConfig::builder_with_provider(provider?)
        .with_safe_default_protocol_versions()
        .ok()
}

/// Build the default TLS configuration.
///
/// Returns `None` if no crypto provider is available.
#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
pub fn default_tls_config() -> Option<ClientConfig> {
    let builder = crypto_provider_builder()?;
    Some(
        builder
            .with_root_certificates(build_root_store())
            .with_no_client_auth(),
    )
}

/// Build the root certificate store from enabled features.
///
/// Native roots win when both root features are enabled.
#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
fn build_root_store() -> rustls::RootCertStore {
    let mut roots = rustls::RootCertStore::empty();

    #[cfg(feature = "tls-native-roots")]
    {
        let native_certs = rustls_native_certs::load_native_certs();
        if !native_certs.errors.is_empty() {
            // Some certs may still have loaded.
            tracing::debug!("errors loading native certs: {:?}", native_certs.errors);
        }
        roots.add_parsable_certificates(native_certs.certs);
    }

    #[cfg(all(feature = "tls-webpki-roots", not(feature = "tls-native-roots")))]
    {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    roots
}

/// Build an HTTPS connector that also accepts plain `http://` URLs.
///
/// Without a custom config, the default config is built from the enabled
/// features. Fails when no TLS configuration can be produced.
pub fn build_https_connector(
    tls_config: Option<ClientConfig>,
) -> Result<HttpsConnector<HttpConnector>, PipelineError> {
    let config = match tls_config {
        Some(config) => config,
        None => default_config()?,
    };

    Ok(HttpsConnectorBuilder::new()
        .with_tls_config(config)
        .https_or_http()
        .enable_all_versions()
        .build())
}

#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
fn default_config() -> Result<ClientConfig, PipelineError> {
    default_tls_config().ok_or_else(|| {
        PipelineError::transport(
            "HTTPS requires a crypto provider: enable `tls-ring` or `tls-aws-lc`, \
             or install a global rustls CryptoProvider",
        )
    })
}

#[cfg(not(any(feature = "tls-native-roots", feature = "tls-webpki-roots")))]
fn default_config() -> Result<ClientConfig, PipelineError> {
    Err(PipelineError::transport(
        "HTTPS requires TLS root certificates: enable `tls-native-roots` or \
         `tls-webpki-roots`, or pass a custom TLS config",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(all(
        any(feature = "tls-ring", feature = "tls-aws-lc"),
        any(feature = "tls-native-roots", feature = "tls-webpki-roots")
    ))]
    #[test]
    fn test_default_tls_config() {
        assert!(has_tls_support());
        let config = default_tls_config().expect("should build with features enabled");
        assert!(config.alpn_protocols.is_empty());
    }

    #[cfg(all(
        any(feature = "tls-ring", feature = "tls-aws-lc"),
        any(feature = "tls-native-roots", feature = "tls-webpki-roots")
    ))]
    #[test]
    fn test_build_https_connector_default() {
        assert!(build_https_connector(None).is_ok());
    }
}
