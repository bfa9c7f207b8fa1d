use super::SubjectId;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Width of every generated refresh token. With the 64 symbol nanoid alphabet
/// this is 288 bits of entropy.
pub const OPAQUE_TOKEN_LEN: usize = 48;

#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueTokenValue(pub String);

impl OpaqueTokenValue {
    pub fn generate() -> Self {
        OpaqueTokenValue(nanoid::nanoid!(OPAQUE_TOKEN_LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OpaqueTokenValue {
    fn from(value: &str) -> Self {
        OpaqueTokenValue(value.to_string())
    }
}

impl fmt::Display for OpaqueTokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Refresh tokens are bearer credentials; keep them out of logs.
impl fmt::Debug for OpaqueTokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: String = self.0.chars().take(6).collect();
        write!(f, "OpaqueTokenValue({}..)", head)
    }
}

/// A server-side refresh credential record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpaqueToken {
    pub token: OpaqueTokenValue,
    pub subject: SubjectId,
    pub expires_at: DateTime<Utc>,
    pub additional: Option<serde_json::Value>,
}

impl OpaqueToken {
    /// Mints a fresh record for `subject`. The expiry is always strictly after
    /// `now`, a zero `ttl` is bumped to one second.
    pub fn issue(subject: SubjectId, now: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = TimeDelta::from_std(ttl)
            .unwrap_or(TimeDelta::MAX)
            .max(TimeDelta::seconds(1));
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            token: OpaqueTokenValue::generate(),
            subject,
            expires_at,
            additional: None,
        }
    }

    pub fn with_additional(mut self, additional: serde_json::Value) -> Self {
        self.additional = Some(additional);
        self
    }

    /// A record whose expiry equals `now` is already expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}
