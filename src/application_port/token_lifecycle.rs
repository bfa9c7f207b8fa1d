use super::{AuthError, DecodeError};
use crate::domain_model::{Credentials, OpaqueTokenValue, TokenSet};
use std::collections::HashMap;
use std::hash::BuildHasher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Resolving,
    Authenticated,
    Rejected,
    NeedsRefresh,
    /// Resolution aborted on a configuration or infrastructure fault; says
    /// nothing about the token itself.
    Failed,
}

/// Terminal outcome of validating one bearer token.
#[derive(Debug)]
pub enum Resolution<S> {
    /// No token, or not a token this guard understands. Other mechanisms may
    /// still authenticate the request.
    Unauthenticated,
    Authenticated(S),
    NeedsRefresh(DecodeError),
    Rejected(DecodeError),
}

impl<S> Resolution<S> {
    pub fn state(&self) -> AuthState {
        match self {
            Resolution::Unauthenticated => AuthState::Unauthenticated,
            Resolution::Authenticated(_) => AuthState::Authenticated,
            Resolution::NeedsRefresh(_) => AuthState::NeedsRefresh,
            Resolution::Rejected(_) => AuthState::Rejected,
        }
    }

    pub fn into_subject(self) -> Result<Option<S>, AuthError> {
        match self {
            Resolution::Unauthenticated => Ok(None),
            Resolution::Authenticated(subject) => Ok(Some(subject)),
            Resolution::NeedsRefresh(e) => Err(AuthError::RefreshRequired(e)),
            Resolution::Rejected(e) => Err(AuthError::Unauthorized(e)),
        }
    }
}

/// Header lookup used for bearer extraction. Names compare case-insensitively.
pub trait RequestHeaders {
    fn header(&self, name: &str) -> Option<&str>;
}

impl<H: BuildHasher> RequestHeaders for HashMap<String, String, H> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl RequestHeaders for [(&str, &str)] {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }
}

/// Request-independent operations of the guard, as consumed by a transport.
#[async_trait::async_trait]
pub trait TokenLifecycle<S>: Send + Sync {
    async fn issue_with_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<TokenSet>, AuthError>;
    async fn validate(&self, credentials: &Credentials) -> Result<bool, AuthError>;
    async fn refresh(&self, refresh_token: &OpaqueTokenValue) -> Result<TokenSet, AuthError>;
    async fn revoke(&self, refresh_token: &OpaqueTokenValue) -> Result<(), AuthError>;
    async fn authenticate(&self, raw_token: &str) -> Result<Resolution<S>, AuthError>;
}
