use super::{RefreshCoordinator, TokenIssuer};
use crate::application_port::{
    AuthError, AuthState, ClaimsMapper, CredentialsProvider, DecodeError, RequestHeaders,
    Resolution, TokenCodec, TokenLifecycle,
};
use crate::domain_model::{Authenticatable, Credentials, OpaqueTokenValue, TokenSet};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Where the access token lives in a request.
#[derive(Debug, Clone)]
pub struct BearerExtractor {
    header: String,
    prefix: String,
}

impl Default for BearerExtractor {
    fn default() -> Self {
        Self::new("Authorization", "Bearer")
    }
}

impl BearerExtractor {
    pub fn new(header: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            prefix: prefix.into(),
        }
    }

    pub fn extract<'r, H: RequestHeaders + ?Sized>(&self, headers: &'r H) -> Option<&'r str> {
        let value = headers.header(&self.header)?.trim();
        let scheme = value.get(..self.prefix.len())?;
        if !scheme.eq_ignore_ascii_case(&self.prefix) {
            return None;
        }

        let rest = &value[self.prefix.len()..];
        if !rest.starts_with(' ') {
            return None;
        }
        let token = rest.trim_start();
        (!token.is_empty()).then_some(token)
    }
}

pub struct JwtGuard<S> {
    codec: Arc<dyn TokenCodec>,
    mapper: Arc<dyn ClaimsMapper<S>>,
    credentials: Arc<dyn CredentialsProvider<S>>,
    issuer: Arc<TokenIssuer<S>>,
    coordinator: RefreshCoordinator<S>,
    extractor: BearerExtractor,
}

impl<S: Authenticatable + 'static> JwtGuard<S> {
    pub fn new(
        codec: Arc<dyn TokenCodec>,
        mapper: Arc<dyn ClaimsMapper<S>>,
        credentials: Arc<dyn CredentialsProvider<S>>,
        issuer: Arc<TokenIssuer<S>>,
        coordinator: RefreshCoordinator<S>,
        extractor: BearerExtractor,
    ) -> Self {
        Self {
            codec,
            mapper,
            credentials,
            issuer,
            coordinator,
            extractor,
        }
    }

    /// Starts the authentication state of a single request.
    pub fn for_request<H: RequestHeaders + ?Sized>(&self, headers: &H) -> RequestGuard<'_, S> {
        RequestGuard {
            guard: self,
            token: self.extractor.extract(headers).map(str::to_owned),
            subject: OnceCell::new(),
            state: Mutex::new(AuthState::Unauthenticated),
        }
    }

    async fn resolve(&self, raw: &str) -> Result<Resolution<S>, AuthError> {
        let claims = match self.codec.decode(raw).await {
            Ok(claims) => claims,
            Err(DecodeError::Malformed) => {
                debug!("bearer value is not a signed token, leaving it to other guards");
                return Ok(Resolution::Unauthenticated);
            }
            Err(e) if e.requires_refresh() => {
                debug!(error = %e, "access token needs a refresh");
                return Ok(Resolution::NeedsRefresh(e));
            }
            Err(e) => {
                warn!(error = %e, "rejected access token");
                return Ok(Resolution::Rejected(e));
            }
        };

        let subject = self.mapper.unpack(&claims).map_err(|e| {
            error!(
                subject = %claims.subject,
                error = %e,
                "verified claims did not map onto a subject"
            );
            AuthError::SubjectMapping(e.to_string())
        })?;
        if subject.subject_id() != claims.subject {
            error!(
                subject = %claims.subject,
                mapped = %subject.subject_id(),
                "claims mapper returned a different subject"
            );
            return Err(AuthError::SubjectMapping(format!(
                "claims for {} mapped onto {}",
                claims.subject,
                subject.subject_id()
            )));
        }

        Ok(Resolution::Authenticated(subject))
    }

    async fn subject_from_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<S>, AuthError> {
        let Some(subject) = self.credentials.retrieve_by_credentials(credentials).await? else {
            return Ok(None);
        };
        if !self
            .credentials
            .validate_credentials(&subject, credentials)
            .await?
        {
            return Ok(None);
        }
        Ok(Some(subject))
    }
}

#[async_trait::async_trait]
impl<S: Authenticatable + 'static> TokenLifecycle<S> for JwtGuard<S> {
    async fn issue_with_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<TokenSet>, AuthError> {
        let Some(subject) = self.subject_from_credentials(credentials).await? else {
            info!(username = %credentials.username, "credential validation failed");
            return Ok(None);
        };

        let set = self.issuer.issue(&subject).await?;
        info!(subject = %subject.subject_id(), "login");
        Ok(Some(set))
    }

    async fn validate(&self, credentials: &Credentials) -> Result<bool, AuthError> {
        Ok(self.subject_from_credentials(credentials).await?.is_some())
    }

    async fn refresh(&self, refresh_token: &OpaqueTokenValue) -> Result<TokenSet, AuthError> {
        self.coordinator.refresh(refresh_token).await
    }

    async fn revoke(&self, refresh_token: &OpaqueTokenValue) -> Result<(), AuthError> {
        self.issuer.revoke(refresh_token).await
    }

    async fn authenticate(&self, raw_token: &str) -> Result<Resolution<S>, AuthError> {
        self.resolve(raw_token).await
    }
}

/// Authentication state of one request. The subject is resolved at most once;
/// later calls observe the cached outcome, failures included.
pub struct RequestGuard<'g, S> {
    guard: &'g JwtGuard<S>,
    token: Option<String>,
    subject: OnceCell<Result<Option<S>, AuthError>>,
    state: Mutex<AuthState>,
}

impl<'g, S: Authenticatable + 'static> RequestGuard<'g, S> {
    pub fn bearer_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn state(&self) -> AuthState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, state: AuthState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }

    /// `Ok(None)` means this guard has nothing to say about the request.
    pub async fn subject(&self) -> Result<Option<&S>, AuthError> {
        match self.subject.get_or_init(|| self.resolve()).await {
            Ok(subject) => Ok(subject.as_ref()),
            Err(e) => Err(e.clone()),
        }
    }

    async fn resolve(&self) -> Result<Option<S>, AuthError> {
        let Some(raw) = self.token.as_deref() else {
            return Ok(None);
        };

        self.set_state(AuthState::Resolving);
        match self.guard.resolve(raw).await {
            Ok(resolution) => {
                self.set_state(resolution.state());
                resolution.into_subject()
            }
            Err(e) => {
                self.set_state(AuthState::Failed);
                Err(e)
            }
        }
    }

    /// Treats the request as authenticated by `subject`, e.g. after another
    /// mechanism (a session) already vouched for it.
    pub fn set_subject(&mut self, subject: S) {
        self.subject = OnceCell::from(Ok(Some(subject)));
        self.set_state(AuthState::Authenticated);
    }

    pub async fn issue_for_current_subject(&self) -> Result<Option<TokenSet>, AuthError> {
        match self.subject().await? {
            Some(subject) => self.guard.issuer.issue(subject).await.map(Some),
            None => Ok(None),
        }
    }
}
