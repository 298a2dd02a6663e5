//! Configuration modules for the GraphQL client.
//!
//! This module contains pipeline and request-level configuration:
//! - [`PipelineConfig`]: Options consumed by the built-in interceptors
//! - [`RetryPolicy`]: Retry limit with optional exponential backoff
//! - [`CallOptions`]: Per-fetch headers and cache-policy override

mod options;
mod pipeline;
mod retry;

pub use options::CallOptions;
pub use pipeline::PipelineConfig;
pub use retry::{ExponentialBackoff, RetryPolicy, defaults};
