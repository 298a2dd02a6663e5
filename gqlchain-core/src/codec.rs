//! GraphQL-over-HTTP wire codec.
//!
//! Encodes an [`Operation`] into either a POST JSON body or a GET query
//! string, and decodes response bodies into [`GraphqlResponse`].
//!
//! POST body:
//!
//! ```text
//! {"operationName": "Hero", "query": "...", "variables": {...}, "extensions": {...}}
//! ```
//!
//! GET query string carries the same fields, with `variables` and
//! `extensions` as JSON text. Empty variables are omitted on GET.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::error::CodecError;
use crate::operation::{Operation, Variables};
use crate::persisted::persisted_query_extension;
use crate::response::GraphqlResponse;

/// HTTP method used to send an operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// How a single request should be put on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WireOptions {
    pub method: HttpMethod,
    /// Include the full document text.
    pub send_document: bool,
    /// Include the persisted-query extension with the document hash.
    pub persisted_query: bool,
}

impl Default for WireOptions {
    fn default() -> Self {
        Self {
            method: HttpMethod::Post,
            send_document: true,
            persisted_query: false,
        }
    }
}

/// An encoded request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireRequest {
    /// URL query string (without the leading `?`) for a GET request.
    Query(String),
    /// JSON body for a POST request.
    Body(Bytes),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostBody<'a> {
    operation_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
    variables: &'a Variables,
    #[serde(skip_serializing_if = "Option::is_none")]
    extensions: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GetParams<'a> {
    operation_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extensions: Option<String>,
}

/// Encode an operation for the wire.
///
/// Fails with [`CodecError::MissingDocument`] when the document text is
/// requested but the operation is persisted-only, or when neither the
/// document nor the persisted-query hash would be sent.
pub fn encode_request(op: &Operation, options: WireOptions) -> Result<WireRequest, CodecError> {
    let query = if options.send_document {
        Some(op.document().ok_or_else(|| CodecError::MissingDocument {
            operation: op.name().to_owned(),
        })?)
    } else {
        None
    };
    if query.is_none() && !options.persisted_query {
        return Err(CodecError::MissingDocument {
            operation: op.name().to_owned(),
        });
    }
    let extensions = options
        .persisted_query
        .then(|| persisted_query_extension(op.document_hash()));

    match options.method {
        HttpMethod::Post => {
            let body = PostBody {
                operation_name: op.name(),
                query,
                variables: op.variables(),
                extensions,
            };
            let bytes = serde_json::to_vec(&body).map_err(|e| CodecError::encode(e.to_string()))?;
            Ok(WireRequest::Body(Bytes::from(bytes)))
        }
        HttpMethod::Get => {
            let variables = if op.variables().is_empty() {
                None
            } else {
                Some(
                    serde_json::to_string(op.variables())
                        .map_err(|e| CodecError::encode(e.to_string()))?,
                )
            };
            let extensions = extensions
                .map(|ext| serde_json::to_string(&ext))
                .transpose()
                .map_err(|e| CodecError::encode(e.to_string()))?;
            let params = GetParams {
                operation_name: op.name(),
                query,
                variables,
                extensions,
            };
            let qs = serde_qs::to_string(&params).map_err(|e| CodecError::encode(e.to_string()))?;
            Ok(WireRequest::Query(qs))
        }
    }
}

/// Decode a response body.
///
/// The body must be a JSON object containing `data` or `errors`.
pub fn decode_response(body: &[u8]) -> Result<GraphqlResponse, CodecError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| CodecError::decode(e.to_string()))?;
    let Value::Object(map) = &value else {
        return Err(CodecError::decode("response body is not a JSON object"));
    };
    if !map.contains_key("data") && !map.contains_key("errors") {
        return Err(CodecError::decode(
            "response contains neither `data` nor `errors`",
        ));
    }
    serde_json::from_value(value).map_err(|e| CodecError::decode(e.to_string()))
}
