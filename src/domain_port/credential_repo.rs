use super::StoreError;
use crate::domain_model::SubjectId;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub subject: SubjectId,
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait CredentialRepo: Send + Sync {
    /// Fetch credentials by username (for login).
    async fn get_by_username(&self, username: &str)
    -> Result<Option<CredentialRecord>, StoreError>;

    /// Fetch credentials of an already resolved subject (for re-validation).
    async fn get_by_subject(
        &self,
        subject: &SubjectId,
    ) -> Result<Option<CredentialRecord>, StoreError>;
}
