//! Core protocol types for gqlchain.
//!
//! This crate provides the transport-agnostic pieces shared by the request
//! pipeline in `gqlchain-client`:
//!
//! - `operation`: operations, cache policies, variables and cache keys
//! - `codec`: wire encoding of requests and decoding of response documents
//! - `persisted`: automatic persisted query (APQ) helpers
//! - `response`: GraphQL response documents and data-level errors
//! - `error`: codec error type

mod codec;
mod error;
mod operation;
mod persisted;
mod response;

pub use codec::*;
pub use error::*;
pub use operation::*;
pub use persisted::*;
pub use response::*;
