use crate::domain_port::{CacheError, ResultCache};
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct MemoryResultCache {
    entries: DashMap<String, (String, Instant)>,
}

impl MemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ResultCache for MemoryResultCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        // Expired entries are dropped lazily on read.
        self.entries.remove_if(key, |_, (_, deadline)| *deadline <= now);
        Ok(self.entries.get(key).map(|e| e.value().0.clone()))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }
}
