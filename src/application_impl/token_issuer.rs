use super::DeferredDeletion;
use crate::application_port::{AuthError, ClaimsMapper, TokenCodec};
use crate::domain_model::{Authenticatable, OpaqueToken, OpaqueTokenValue, TokenSet};
use crate::domain_port::{Clock, OpaqueTokenStore, SubjectRepository};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Mints, rotates and revokes token sets. Knows nothing about concurrency;
/// single-flight is layered on top by the refresh coordinator.
pub struct TokenIssuer<S> {
    codec: Arc<dyn TokenCodec>,
    mapper: Arc<dyn ClaimsMapper<S>>,
    subjects: Arc<dyn SubjectRepository<S>>,
    store: Arc<dyn OpaqueTokenStore>,
    deletion: DeferredDeletion,
    clock: Arc<dyn Clock>,
    refresh_ttl: Duration,
}

impl<S: Authenticatable + 'static> TokenIssuer<S> {
    pub fn new(
        codec: Arc<dyn TokenCodec>,
        mapper: Arc<dyn ClaimsMapper<S>>,
        subjects: Arc<dyn SubjectRepository<S>>,
        store: Arc<dyn OpaqueTokenStore>,
        deletion: DeferredDeletion,
        clock: Arc<dyn Clock>,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            codec,
            mapper,
            subjects,
            store,
            deletion,
            clock,
            refresh_ttl,
        }
    }

    pub async fn issue(&self, subject: &S) -> Result<TokenSet, AuthError> {
        self.issue_with(subject, None).await
    }

    async fn issue_with(
        &self,
        subject: &S,
        additional: Option<serde_json::Value>,
    ) -> Result<TokenSet, AuthError> {
        let claims = self.mapper.pack(subject);
        let subject_id = subject.subject_id();
        if claims.subject != subject_id {
            return Err(AuthError::SubjectMapping(format!(
                "subject {} packed as {}",
                subject_id, claims.subject
            )));
        }

        let access_token = self.codec.create(&claims).await?;

        let mut refresh_token = OpaqueToken::issue(subject_id, self.clock.now(), self.refresh_ttl);
        refresh_token.additional = additional;
        self.store.create(&refresh_token).await?;

        info!(
            subject = %refresh_token.subject,
            jti = %access_token.claims.jti,
            "issued token set"
        );

        Ok(TokenSet {
            access_token,
            refresh_token,
        })
    }

    /// Looks up a refresh token and checks it against the clock.
    pub async fn find_valid(&self, token: &OpaqueTokenValue) -> Result<OpaqueToken, AuthError> {
        let record = self
            .store
            .find(token)
            .await?
            .ok_or(AuthError::UnknownRefreshToken)?;

        if record.is_expired_at(self.clock.now()) {
            return Err(AuthError::ExpiredRefreshToken);
        }

        Ok(record)
    }

    /// Replaces `old` with a freshly minted set. The old record stays readable
    /// until the deletion leeway has passed.
    pub async fn rotate(&self, old: &OpaqueTokenValue) -> Result<TokenSet, AuthError> {
        let record = self.find_valid(old).await?;
        let subject = self
            .subjects
            .find(&record.subject)
            .await?
            .ok_or_else(|| AuthError::SubjectNotFound(record.subject.clone()))?;

        let set = self.issue_with(&subject, record.additional.clone()).await?;
        self.deletion.schedule(record.token);

        info!(
            subject = %set.refresh_token.subject,
            leeway_secs = self.deletion.leeway().as_secs(),
            "rotated refresh token"
        );

        Ok(set)
    }

    /// Idempotent; unknown tokens are silently accepted.
    pub async fn revoke(&self, token: &OpaqueTokenValue) -> Result<(), AuthError> {
        self.store.delete(token).await?;
        info!(?token, "revoked refresh token");
        Ok(())
    }
}
