use crate::application_port::{AuthError, Resolution};
use crate::domain_model::{Authenticatable, SubjectId, TokenSet};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

pub const ACCESS_TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessTokenView {
    #[serde(rename = "type")]
    pub token_type: String,
    pub token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshTokenView {
    pub token: String,
    pub expires_in: i64,
}

/// Client-facing shape of a token set; lifetimes are relative to `now`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenSetView {
    pub access_token: AccessTokenView,
    pub refresh_token: RefreshTokenView,
}

impl TokenSetView {
    pub fn new(set: &TokenSet, now: DateTime<Utc>) -> Self {
        TokenSetView {
            access_token: AccessTokenView {
                token_type: ACCESS_TOKEN_TYPE.to_string(),
                token: set.access_token.token.clone(),
                expires_in: (set.access_token.expires_at() - now).num_seconds().max(0),
            },
            refresh_token: RefreshTokenView {
                token: set.refresh_token.token.as_str().to_string(),
                expires_in: set.refresh_token.expires_in(now),
            },
        }
    }
}

/// Stable, transport-independent result of a token operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuthOutcome {
    Issued { tokens: TokenSetView },
    Authenticated { subject: SubjectId },
    RefreshRequired { reason: String },
    RefreshTokenExpired,
    MalformedRefreshToken,
    Unauthorized { reason: String },
    RevokeSucceeded,
    CredentialValidationFailed,
    /// Rotation timed out or a backend failed. Kept apart from the 401/498
    /// family so it can be alerted on.
    Unavailable { reason: String },
}

impl AuthOutcome {
    pub fn issued(set: &TokenSet, now: DateTime<Utc>) -> Self {
        AuthOutcome::Issued {
            tokens: TokenSetView::new(set, now),
        }
    }

    pub fn from_resolution<S: Authenticatable>(resolution: Resolution<S>) -> Self {
        match resolution {
            Resolution::Authenticated(subject) => AuthOutcome::Authenticated {
                subject: subject.subject_id(),
            },
            Resolution::Unauthenticated => AuthOutcome::Unauthorized {
                reason: "no usable bearer token".to_string(),
            },
            Resolution::NeedsRefresh(e) => AuthOutcome::RefreshRequired {
                reason: e.to_string(),
            },
            Resolution::Rejected(e) => AuthOutcome::Unauthorized {
                reason: e.to_string(),
            },
        }
    }

    /// HTTP status conventionally paired with the outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthOutcome::Issued { .. } | AuthOutcome::Authenticated { .. } => 200,
            AuthOutcome::RefreshRequired { .. } => 498,
            AuthOutcome::RefreshTokenExpired => 440,
            AuthOutcome::MalformedRefreshToken => 400,
            AuthOutcome::Unauthorized { .. } => 401,
            AuthOutcome::RevokeSucceeded => 204,
            AuthOutcome::CredentialValidationFailed => 422,
            AuthOutcome::Unavailable { .. } => 503,
        }
    }

    fn unavailable<E: std::fmt::Display>(error: E) -> Self {
        warn!("token operation unavailable: {}", error);
        AuthOutcome::Unavailable {
            reason: error.to_string(),
        }
    }
}

impl From<AuthError> for AuthOutcome {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::RefreshRequired(e) => AuthOutcome::RefreshRequired {
                reason: e.to_string(),
            },
            AuthError::Unauthorized(e) => AuthOutcome::Unauthorized {
                reason: e.to_string(),
            },
            AuthError::UnknownRefreshToken => AuthOutcome::MalformedRefreshToken,
            AuthError::ExpiredRefreshToken => AuthOutcome::RefreshTokenExpired,
            AuthError::SubjectNotFound(subject) => AuthOutcome::Unauthorized {
                reason: format!("subject {} no longer exists", subject),
            },
            e @ (AuthError::RotationTimeout
            | AuthError::DuplicateToken
            | AuthError::SubjectMapping(_)
            | AuthError::Store(_)
            | AuthError::InternalError(_)) => AuthOutcome::unavailable(e),
        }
    }
}
