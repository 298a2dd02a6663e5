//! Operation description types.
//!
//! An [`Operation`] is the immutable description of one network request:
//! its name, kind, document (or persisted-query hash), variables and
//! [`CachePolicy`].

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::persisted::document_hash;

/// Operation variables, in declaration order.
pub type Variables = serde_json::Map<String, Value>;

/// The kind of GraphQL operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// Get the string representation used on the wire and in headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-operation rule governing whether and how the local cache may satisfy
/// or supplement a network fetch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CachePolicy {
    /// Return cached data if present, otherwise fetch from the network.
    #[default]
    ReturnCacheDataElseFetch,
    /// Always fetch; results are still written to the cache.
    FetchIgnoringCache,
    /// Only ever return cached data; a miss is an error.
    ReturnCacheDataDontFetch,
    /// Return cached data if present, then fetch from the network as well.
    ReturnCacheDataAndFetch,
    /// Always fetch, and never read from or write to the cache.
    FetchIgnoringCacheCompletely,
}

impl CachePolicy {
    /// Whether the cache-read stage looks up the cache at all.
    pub fn reads_cache(&self) -> bool {
        matches!(
            self,
            CachePolicy::ReturnCacheDataElseFetch
                | CachePolicy::ReturnCacheDataDontFetch
                | CachePolicy::ReturnCacheDataAndFetch
        )
    }

    /// Whether the cache-write stage stores results.
    pub fn writes_cache(&self) -> bool {
        !matches!(self, CachePolicy::FetchIgnoringCacheCompletely)
    }

    /// Whether a cache hit still continues to the network.
    pub fn fetches_after_hit(&self) -> bool {
        matches!(self, CachePolicy::ReturnCacheDataAndFetch)
    }

    /// Whether a cache miss is allowed to continue to the network.
    pub fn fetches_after_miss(&self) -> bool {
        !matches!(self, CachePolicy::ReturnCacheDataDontFetch)
    }
}

/// Deterministic cache key derived from an operation's identity and
/// variables.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable description of one network request.
///
/// # Example
///
/// ```
/// use gqlchain_core::{CachePolicy, Operation};
///
/// let op = Operation::query("Hero", "query Hero($episode: Episode) { hero(episode: $episode) { name } }")
///     .variable("episode", "JEDI")
///     .with_cache_policy(CachePolicy::FetchIgnoringCache);
///
/// assert_eq!(op.name(), "Hero");
/// assert_eq!(op.document_hash().len(), 64);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    name: String,
    kind: OperationKind,
    /// Full document text. `None` for persisted-only operations.
    document: Option<Arc<str>>,
    /// Lowercase hex SHA-256 of the document.
    document_hash: String,
    variables: Variables,
    cache_policy: CachePolicy,
}

impl Operation {
    /// Create an operation from its full document text.
    pub fn new(kind: OperationKind, name: impl Into<String>, document: impl Into<String>) -> Self {
        let document: String = document.into();
        let document_hash = document_hash(&document);
        Self {
            name: name.into(),
            kind,
            document: Some(Arc::from(document)),
            document_hash,
            variables: Variables::new(),
            cache_policy: CachePolicy::default(),
        }
    }

    /// Create a query operation.
    pub fn query(name: impl Into<String>, document: impl Into<String>) -> Self {
        Self::new(OperationKind::Query, name, document)
    }

    /// Create a mutation operation.
    pub fn mutation(name: impl Into<String>, document: impl Into<String>) -> Self {
        Self::new(OperationKind::Mutation, name, document)
    }

    /// Create a subscription operation.
    pub fn subscription(name: impl Into<String>, document: impl Into<String>) -> Self {
        Self::new(OperationKind::Subscription, name, document)
    }

    /// Create a persisted-only operation identified by its document hash.
    ///
    /// The server must already know the document; such operations can never
    /// fall back to sending the full text.
    pub fn persisted(
        kind: OperationKind,
        name: impl Into<String>,
        document_hash: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            document: None,
            document_hash: document_hash.into(),
            variables: Variables::new(),
            cache_policy: CachePolicy::default(),
        }
    }

    /// Replace all variables.
    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Set a single variable.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Set the cache policy.
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// The full document text, if this operation carries one.
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn document_hash(&self) -> &str {
        &self.document_hash
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    /// Derive the cache key for this operation.
    ///
    /// Variables are serialized with object keys sorted at every level, so
    /// two operations whose variables differ only in insertion order share a
    /// key.
    pub fn cache_key(&self) -> CacheKey {
        let variables = canonicalize(&Value::Object(self.variables.clone()));
        CacheKey(format!("{}:{}:{}", self.name, self.document_hash, variables))
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HERO: &str = "query Hero { hero { name } }";

    #[test]
    fn test_operation_defaults() {
        let op = Operation::query("Hero", HERO);
        assert_eq!(op.kind(), OperationKind::Query);
        assert_eq!(op.document(), Some(HERO));
        assert_eq!(op.cache_policy(), CachePolicy::ReturnCacheDataElseFetch);
        assert!(op.variables().is_empty());
    }

    #[test]
    fn test_document_hash_is_sha256_hex() {
        let op = Operation::query("Hero", HERO);
        assert_eq!(op.document_hash().len(), 64);
        assert!(op.document_hash().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(op.document_hash(), document_hash(HERO));
    }

    #[test]
    fn test_persisted_operation_has_no_document() {
        let op = Operation::persisted(OperationKind::Query, "Hero", "abc123");
        assert!(op.document().is_none());
        assert_eq!(op.document_hash(), "abc123");
    }

    #[test]
    fn test_variables_keep_declaration_order() {
        let op = Operation::query("Hero", HERO)
            .variable("z", 1)
            .variable("a", 2);
        let keys: Vec<&str> = op.variables().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_cache_key_ignores_variable_order() {
        let first = Operation::query("Hero", HERO)
            .variable("episode", "JEDI")
            .variable("filter", json!({"b": 1, "a": [{"y": 2, "x": 1}]}));
        let second = Operation::query("Hero", HERO)
            .variable("filter", json!({"a": [{"x": 1, "y": 2}], "b": 1}))
            .variable("episode", "JEDI");
        assert_eq!(first.cache_key(), second.cache_key());
    }

    #[test]
    fn test_cache_key_distinguishes_variables() {
        let jedi = Operation::query("Hero", HERO).variable("episode", "JEDI");
        let empire = Operation::query("Hero", HERO).variable("episode", "EMPIRE");
        assert_ne!(jedi.cache_key(), empire.cache_key());
        assert!(jedi.cache_key().as_str().starts_with("Hero:"));
    }

    #[test]
    fn test_cache_policy_flags() {
        assert!(CachePolicy::ReturnCacheDataElseFetch.reads_cache());
        assert!(!CachePolicy::FetchIgnoringCache.reads_cache());
        assert!(CachePolicy::FetchIgnoringCache.writes_cache());
        assert!(!CachePolicy::FetchIgnoringCacheCompletely.reads_cache());
        assert!(!CachePolicy::FetchIgnoringCacheCompletely.writes_cache());
        assert!(CachePolicy::ReturnCacheDataAndFetch.fetches_after_hit());
        assert!(!CachePolicy::ReturnCacheDataElseFetch.fetches_after_hit());
        assert!(!CachePolicy::ReturnCacheDataDontFetch.fetches_after_miss());
    }
}
