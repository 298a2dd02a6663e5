//! Cache capability used by the cache-read and cache-write stages.
//!
//! The pipeline treats the cache as an opaque keyed record store. Records
//! are the `data` objects of successful results; normalization of object
//! graphs is left to the implementation.

use std::collections::HashMap;

use gqlchain_core::CacheKey;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::CacheError;
use crate::interceptor::BoxFuture;

/// A stored record.
pub type Record = Value;

/// Keyed record store shared by every chain of a client.
///
/// Implementations must synchronize internally: many chains read and write
/// concurrently.
pub trait NormalizedCache: Send + Sync {
    /// Look up a record. `Ok(None)` is a miss.
    fn read<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, Result<Option<Record>, CacheError>>;

    /// Store a record, replacing any previous one.
    fn write(&self, key: CacheKey, record: Record) -> BoxFuture<'_, Result<(), CacheError>>;
}

/// An in-process cache backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    records: RwLock<HashMap<CacheKey, Record>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Remove every record.
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

impl NormalizedCache for InMemoryCache {
    fn read<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, Result<Option<Record>, CacheError>> {
        Box::pin(async move { Ok(self.records.read().await.get(key).cloned()) })
    }

    fn write(&self, key: CacheKey, record: Record) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async move {
            self.records.write().await.insert(key, record);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gqlchain_core::Operation;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_read_write() {
        let cache = InMemoryCache::new();
        let key = Operation::query("Hero", "query Hero { hero { name } }").cache_key();

        assert_eq!(cache.read(&key).await.unwrap(), None);
        cache.write(key.clone(), json!({"hero": {"name": "Luke"}})).await.unwrap();
        assert_eq!(
            cache.read(&key).await.unwrap(),
            Some(json!({"hero": {"name": "Luke"}}))
        );
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
