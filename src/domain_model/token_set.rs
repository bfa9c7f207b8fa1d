use super::{OpaqueToken, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a claims mapper contributes to a new access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectClaims {
    pub subject: SubjectId,
    #[serde(default)]
    pub custom: Map<String, Value>,
}

impl SubjectClaims {
    pub fn new(subject: SubjectId) -> Self {
        Self {
            subject,
            custom: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }
}

/// Verified contents of an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub subject: SubjectId,
    pub key_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub jti: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    #[serde(default)]
    pub custom: Map<String, Value>,
}

impl Claims {
    pub fn custom(&self, key: &str) -> Option<&Value> {
        self.custom.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedToken {
    pub token: String,
    pub claims: Claims,
}

impl SignedToken {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at
    }
}

/// Access token and refresh token minted by one issuance or rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: SignedToken,
    pub refresh_token: OpaqueToken,
}
