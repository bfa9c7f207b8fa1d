use crate::application_port::{AuthError, CredentialHasher, CredentialsProvider};
use crate::domain_model::{Authenticatable, Credentials};
use crate::domain_port::{CredentialRepo, SubjectRepository};
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use std::sync::Arc;
use tracing::debug;

pub struct Argon2PasswordHasher;

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = argon2::password_hash::SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| AuthError::InternalError(format!("invalid PHC hash: {}", e)))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::InternalError(format!("verify error: {}", e))),
        }
    }
}

/// Username/password login over a credential table. Inactive accounts are
/// treated as unknown.
pub struct PasswordCredentialsProvider<S> {
    credentials: Arc<dyn CredentialRepo>,
    subjects: Arc<dyn SubjectRepository<S>>,
    hasher: Arc<dyn CredentialHasher>,
}

impl<S> PasswordCredentialsProvider<S> {
    pub fn new(
        credentials: Arc<dyn CredentialRepo>,
        subjects: Arc<dyn SubjectRepository<S>>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        Self {
            credentials,
            subjects,
            hasher,
        }
    }
}

#[async_trait::async_trait]
impl<S: Authenticatable + 'static> CredentialsProvider<S> for PasswordCredentialsProvider<S> {
    async fn retrieve_by_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<S>, AuthError> {
        let Some(record) = self
            .credentials
            .get_by_username(&credentials.username)
            .await?
        else {
            debug!(username = %credentials.username, "no such username");
            return Ok(None);
        };
        if !record.is_active {
            debug!(subject = %record.subject, "account is inactive");
            return Ok(None);
        }

        Ok(self.subjects.find(&record.subject).await?)
    }

    async fn validate_credentials(
        &self,
        subject: &S,
        credentials: &Credentials,
    ) -> Result<bool, AuthError> {
        let Some(record) = self
            .credentials
            .get_by_subject(&subject.subject_id())
            .await?
        else {
            return Ok(false);
        };
        if !record.is_active || record.username != credentials.username {
            return Ok(false);
        }

        self.hasher
            .verify_password(&credentials.password, &record.password_hash)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::User;
    use crate::infra_local::MemoryCredentialRepo;

    async fn provider(active: bool) -> PasswordCredentialsProvider<User> {
        let hasher = Arc::new(Argon2PasswordHasher);
        let hash = hasher.hash_password("hunter2").await.unwrap();
        let repo = Arc::new(MemoryCredentialRepo::new());
        repo.insert(User::new("42", "alice"), hash, active);
        PasswordCredentialsProvider::new(repo.clone(), repo, hasher)
    }

    #[tokio::test]
    async fn hashes_verify_only_the_original_password() {
        let hasher = Argon2PasswordHasher;
        let hash = hasher.hash_password("hunter2").await.unwrap();
        assert!(hasher.verify_password("hunter2", &hash).await.unwrap());
        assert!(!hasher.verify_password("hunter3", &hash).await.unwrap());
        assert!(hasher.verify_password("hunter2", "not-a-phc").await.is_err());
    }

    #[tokio::test]
    async fn valid_credentials_resolve_the_subject() {
        let provider = provider(true).await;
        let creds = Credentials::new("alice", "hunter2");

        let user = provider.retrieve_by_credentials(&creds).await.unwrap().unwrap();
        assert_eq!(user.id.as_str(), "42");
        assert!(provider.validate_credentials(&user, &creds).await.unwrap());

        let wrong = Credentials::new("alice", "nope");
        assert!(!provider.validate_credentials(&user, &wrong).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_or_inactive_accounts_resolve_to_nothing() {
        let provider = provider(false).await;
        let creds = Credentials::new("alice", "hunter2");
        assert!(provider.retrieve_by_credentials(&creds).await.unwrap().is_none());

        let creds = Credentials::new("bob", "hunter2");
        assert!(provider.retrieve_by_credentials(&creds).await.unwrap().is_none());
    }
}
