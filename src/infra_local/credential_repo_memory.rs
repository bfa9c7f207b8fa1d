use crate::domain_model::{SubjectId, User};
use crate::domain_port::{CredentialRecord, CredentialRepo, StoreError, SubjectRepository};
use chrono::Utc;
use dashmap::DashMap;

/// Users and their password hashes, keyed by subject id.
#[derive(Debug, Default)]
pub struct MemoryCredentialRepo {
    records: DashMap<SubjectId, CredentialRecord>,
}

impl MemoryCredentialRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User, password_hash: String, is_active: bool) {
        self.records.insert(
            user.id.clone(),
            CredentialRecord {
                subject: user.id,
                username: user.username,
                password_hash,
                is_active,
                created_at: Utc::now(),
            },
        );
    }

    pub fn remove(&self, subject: &SubjectId) {
        self.records.remove(subject);
    }
}

#[async_trait::async_trait]
impl CredentialRepo for MemoryCredentialRepo {
    async fn get_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .find(|r| r.username == username)
            .map(|r| r.value().clone()))
    }

    async fn get_by_subject(
        &self,
        subject: &SubjectId,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.records.get(subject).map(|r| r.value().clone()))
    }
}

#[async_trait::async_trait]
impl SubjectRepository<User> for MemoryCredentialRepo {
    async fn find(&self, id: &SubjectId) -> Result<Option<User>, StoreError> {
        Ok(self
            .records
            .get(id)
            .map(|r| User::new(r.subject.clone(), r.username.clone())))
    }
}
