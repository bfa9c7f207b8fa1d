use super::DecodeError;
use crate::domain_model::SubjectId;
use crate::domain_port::{CacheError, StoreError};

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The access token can no longer be used but a refresh may fix it.
    #[error("refresh required: {0}")]
    RefreshRequired(DecodeError),
    #[error("unauthorized: {0}")]
    Unauthorized(DecodeError),
    #[error("unknown refresh token")]
    UnknownRefreshToken,
    #[error("refresh token expired")]
    ExpiredRefreshToken,
    /// Nobody produced a rotation result within the poll budget. Points at a
    /// crashed lock holder or an unavailable cache, not at the caller's token.
    #[error("timed out waiting for refresh token rotation")]
    RotationTimeout,
    #[error("opaque token already exists")]
    DuplicateToken,
    #[error("subject {0} not found")]
    SubjectNotFound(SubjectId),
    /// Verified claims did not map onto an authenticatable subject. This is a
    /// wiring defect and must never be reported as a failed login.
    #[error("subject mapping is misconfigured: {0}")]
    SubjectMapping(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Failures that say something about the infrastructure rather than the
    /// presented credential.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AuthError::RotationTimeout
                | AuthError::SubjectMapping(_)
                | AuthError::Store(_)
                | AuthError::InternalError(_)
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateToken(_) => AuthError::DuplicateToken,
            StoreError::Store(e) => AuthError::Store(e),
            StoreError::InternalError(e) => AuthError::InternalError(e.to_string()),
        }
    }
}

impl From<CacheError> for AuthError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Store(e) => AuthError::Store(e),
            CacheError::InternalError(e) => AuthError::InternalError(e.to_string()),
        }
    }
}

impl From<DecodeError> for AuthError {
    fn from(err: DecodeError) -> Self {
        if err.requires_refresh() {
            AuthError::RefreshRequired(err)
        } else {
            AuthError::Unauthorized(err)
        }
    }
}
