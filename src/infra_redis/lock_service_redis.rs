use crate::domain_port::{CacheError, LockHandle, LockService};
use redis::Script;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::debug;

const LOCK_RELEASE: &str = include_str!("lock_release.lua");

/// Single-instance Redis lock: `SET NX PX` to acquire, compare-and-delete to
/// release.
pub struct RedisLockService {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisLockService {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisLockService {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.prefix, name)
    }
}

#[async_trait::async_trait]
impl LockService for RedisLockService {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockHandle>, CacheError> {
        let handle = LockHandle::new(name, ttl);
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut conn = self.conn.clone();

        let granted: Option<String> = redis::cmd("SET")
            .arg(self.key(name))
            .arg(&handle.owner)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Store(e.to_string()))?;

        Ok(granted.map(|_| handle))
    }

    async fn release(&self, handle: &LockHandle) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = Script::new(LOCK_RELEASE)
            .key(self.key(&handle.name))
            .arg(&handle.owner)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CacheError::Store(e.to_string()))?;

        if deleted == 0 {
            debug!(lock = %handle.name, "lock had already lapsed or changed hands");
        }
        Ok(())
    }
}
