use crate::domain_port::{CacheError, LockHandle, LockService};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct Grant {
    owner: String,
    deadline: Instant,
}

/// Process-local named locks. Grants lapse after their TTL on the Tokio clock.
#[derive(Debug, Default)]
pub struct MemoryLockService {
    grants: DashMap<String, Grant>,
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LockService for MemoryLockService {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockHandle>, CacheError> {
        let now = Instant::now();
        let handle = LockHandle::new(name, ttl);
        let grant = Grant {
            owner: handle.owner.clone(),
            deadline: now + ttl,
        };

        match self.grants.entry(name.to_string()) {
            Entry::Occupied(mut held) => {
                if held.get().deadline > now {
                    return Ok(None);
                }
                held.insert(grant);
            }
            Entry::Vacant(slot) => {
                slot.insert(grant);
            }
        }
        Ok(Some(handle))
    }

    async fn release(&self, handle: &LockHandle) -> Result<(), CacheError> {
        self.grants
            .remove_if(&handle.name, |_, grant| grant.owner == handle.owner);
        Ok(())
    }
}
