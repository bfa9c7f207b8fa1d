use crate::domain_port::{CacheError, ResultCache};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

pub struct RedisResultCache {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisResultCache {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisResultCache {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait::async_trait]
impl ResultCache for RedisResultCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(self.key(key))
            .await
            .map_err(|e| CacheError::Store(e.to_string()))?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.key(key), value, ttl.as_secs().max(1))
            .await
            .map_err(|e| CacheError::Store(e.to_string()))?;
        Ok(())
    }
}
