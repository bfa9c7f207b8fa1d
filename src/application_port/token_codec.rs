use super::AuthError;
use crate::domain_model::{Claims, SignedToken, SubjectClaims};

/// Typed decode failures. Callers branch on the variant, never on a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Not shaped like a signed token at all (wrong segment count).
    #[error("wrong number of segments")]
    Malformed,
    /// The `kid` is absent or names a key that is no longer available.
    #[error("unknown signing key id {0:?}")]
    UnknownKeyId(Option<String>),
    #[error("token expired")]
    Expired,
    #[error("invalid signature")]
    InvalidSignature,
    /// Any other verification failure: issuer, audience, encoding, ...
    #[error("invalid token: {0}")]
    Invalid(String),
}

impl DecodeError {
    pub fn requires_refresh(&self) -> bool {
        matches!(self, DecodeError::UnknownKeyId(_) | DecodeError::Expired)
    }
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    async fn decode(&self, raw: &str) -> Result<Claims, DecodeError>;
    async fn create(&self, claims: &SubjectClaims) -> Result<SignedToken, AuthError>;
}
