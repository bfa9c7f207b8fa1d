use crate::domain_model::{OpaqueToken, OpaqueTokenValue};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("opaque token {0:?} already exists")]
    DuplicateToken(OpaqueTokenValue),
    #[error("infra error: {0}")]
    Store(String),
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Durable refresh-token records. Expiry is stored but never interpreted here;
/// callers compare `expires_at` against their own clock.
#[async_trait::async_trait]
pub trait OpaqueTokenStore: Send + Sync {
    /// Absent records are `Ok(None)`, never an error.
    async fn find(&self, token: &OpaqueTokenValue) -> Result<Option<OpaqueToken>, StoreError>;

    /// Fails with [`StoreError::DuplicateToken`] if the key is taken.
    async fn create(&self, token: &OpaqueToken) -> Result<(), StoreError>;

    /// Idempotent: deleting an absent key is a no-op.
    async fn delete(&self, token: &OpaqueTokenValue) -> Result<(), StoreError>;
}
