use super::CacheError;
use std::time::Duration;

/// A granted named lock. `owner` is a random value so that a holder whose TTL
/// lapsed cannot release somebody else's grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    pub name: String,
    pub owner: String,
    pub ttl: Duration,
}

impl LockHandle {
    pub fn new(name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            owner: nanoid::nanoid!(16),
            ttl,
        }
    }
}

#[async_trait::async_trait]
pub trait LockService: Send + Sync {
    /// Returns `None` while another owner holds an unexpired grant on `name`.
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockHandle>, CacheError>;

    /// Releasing a grant that already expired or was taken over is a no-op.
    async fn release(&self, handle: &LockHandle) -> Result<(), CacheError>;
}
