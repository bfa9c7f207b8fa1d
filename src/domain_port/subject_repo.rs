use super::StoreError;
use crate::domain_model::SubjectId;

/// Loads the owner of a refresh token so rotation can pack fresh claims.
#[async_trait::async_trait]
pub trait SubjectRepository<S>: Send + Sync {
    async fn find(&self, id: &SubjectId) -> Result<Option<S>, StoreError>;
}
