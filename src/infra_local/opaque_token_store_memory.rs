use crate::domain_model::{OpaqueToken, OpaqueTokenValue};
use crate::domain_port::{OpaqueTokenStore, StoreError};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

#[derive(Debug, Default)]
pub struct MemoryOpaqueTokenStore {
    tokens: DashMap<OpaqueTokenValue, OpaqueToken>,
}

impl MemoryOpaqueTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl OpaqueTokenStore for MemoryOpaqueTokenStore {
    async fn find(&self, token: &OpaqueTokenValue) -> Result<Option<OpaqueToken>, StoreError> {
        Ok(self.tokens.get(token).map(|r| r.value().clone()))
    }

    async fn create(&self, token: &OpaqueToken) -> Result<(), StoreError> {
        match self.tokens.entry(token.token.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateToken(token.token.clone())),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(())
            }
        }
    }

    async fn delete(&self, token: &OpaqueTokenValue) -> Result<(), StoreError> {
        self.tokens.remove(token);
        Ok(())
    }
}
