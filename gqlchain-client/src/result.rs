//! Results delivered to the caller.

use gqlchain_core::{GraphqlError, GraphqlResponse};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::PipelineError;

/// Where a result came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultSource {
    Cache,
    Server,
}

/// A decoded GraphQL result.
///
/// `errors` carries data-level GraphQL errors; a result with errors is still
/// a successful delivery.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphQLResult {
    pub data: Option<Value>,
    pub errors: Vec<GraphqlError>,
    pub extensions: Option<Value>,
    pub source: ResultSource,
}

impl GraphQLResult {
    /// A result served from the cache.
    pub fn from_cache(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
            extensions: None,
            source: ResultSource::Cache,
        }
    }

    /// A result decoded from a server response.
    pub fn from_server(response: GraphqlResponse) -> Self {
        Self {
            data: response.data,
            errors: response.errors,
            extensions: response.extensions,
            source: ResultSource::Server,
        }
    }

    /// Returns `true` if `data` is present and not null.
    pub fn has_data(&self) -> bool {
        matches!(&self.data, Some(data) if !data.is_null())
    }

    /// Returns `true` if data is present and no GraphQL errors were returned.
    pub fn is_success(&self) -> bool {
        self.has_data() && self.errors.is_empty()
    }

    /// Deserialize `data` into a typed value.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>, PipelineError> {
        match &self.data {
            Some(data) if !data.is_null() => serde_json::from_value(data.clone())
                .map(Some)
                .map_err(|e| PipelineError::parse(e.to_string())),
            _ => Ok(None),
        }
    }
}

/// One emission on a chain's result stream.
///
/// `chain_active` tells the caller whether more deliveries may follow.
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    pub result: Result<GraphQLResult, PipelineError>,
    pub chain_active: bool,
}

impl Delivery {
    /// Returns `true` if this is the last delivery of the chain.
    pub fn is_final(&self) -> bool {
        !self.chain_active
    }
}
