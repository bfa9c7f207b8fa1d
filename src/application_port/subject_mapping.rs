use super::AuthError;
use crate::domain_model::{Claims, Credentials, SubjectClaims};

#[derive(Debug, thiserror::Error)]
#[error("cannot map claims onto a subject: {0}")]
pub struct MappingError(pub String);

pub trait ClaimsMapper<S>: Send + Sync {
    fn pack(&self, subject: &S) -> SubjectClaims;
    fn unpack(&self, claims: &Claims) -> Result<S, MappingError>;
}

#[async_trait::async_trait]
pub trait CredentialsProvider<S>: Send + Sync {
    async fn retrieve_by_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<S>, AuthError>;

    async fn validate_credentials(
        &self,
        subject: &S,
        credentials: &Credentials,
    ) -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}
