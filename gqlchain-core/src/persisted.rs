//! Automatic persisted query (APQ) helpers.
//!
//! The client first sends only a SHA-256 hash of the document. A server that
//! doesn't know the hash answers with a `PersistedQueryNotFound` error, and
//! the client repeats the request with the full document attached.

use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::response::GraphqlError;

/// Version of the persisted-query extension protocol.
pub const PERSISTED_QUERY_VERSION: u32 = 1;

const NOT_FOUND: &str = "PersistedQueryNotFound";
const NOT_SUPPORTED: &str = "PersistedQueryNotSupported";

/// Compute the lowercase hex SHA-256 digest of a document.
pub fn document_hash(document: &str) -> String {
    hex::encode(Sha256::digest(document.as_bytes()))
}

/// Build the `extensions` object announcing a persisted-query hash.
pub fn persisted_query_extension(hash: &str) -> Value {
    json!({
        "persistedQuery": {
            "version": PERSISTED_QUERY_VERSION,
            "sha256Hash": hash,
        }
    })
}

/// Server signal that a persisted-query hash could not be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistedQuerySignal {
    /// The server doesn't know the hash yet.
    NotFound,
    /// The server doesn't support persisted queries at all.
    NotSupported,
}

impl PersistedQuerySignal {
    /// Inspect response errors for a persisted-query signal.
    ///
    /// Both the error message and `extensions.code` are checked.
    pub fn detect(errors: &[GraphqlError]) -> Option<Self> {
        errors.iter().find_map(|error| {
            let code = error
                .extensions
                .as_ref()
                .and_then(|ext| ext.get("code"))
                .and_then(Value::as_str);
            [error.message.as_str()]
                .into_iter()
                .chain(code)
                .find_map(Self::from_marker)
        })
    }

    fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            NOT_FOUND | "PERSISTED_QUERY_NOT_FOUND" => Some(Self::NotFound),
            NOT_SUPPORTED | "PERSISTED_QUERY_NOT_SUPPORTED" => Some(Self::NotSupported),
            _ => None,
        }
    }
}
