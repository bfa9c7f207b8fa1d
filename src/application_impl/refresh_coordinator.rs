use super::TokenIssuer;
use crate::application_port::AuthError;
use crate::domain_model::{Authenticatable, OpaqueTokenValue, TokenSet};
use crate::domain_port::{LockHandle, LockService, ResultCache};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

const LOCK_PREFIX: &str = "lock_jwt_refresh:";
const CACHE_PREFIX: &str = "cache_jwt_refresh:";

#[derive(Debug, Clone)]
pub struct RotationPolicy {
    /// Bounds how long a crashed holder can block rotation of its token.
    pub lock_ttl: Duration,
    pub cache_ttl: Duration,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            poll_attempts: 10,
        }
    }
}

struct RotationKeys {
    lock: String,
    cache: String,
}

impl RotationKeys {
    // Keys are derived from a digest so raw refresh tokens never reach the
    // lock/cache backend.
    fn for_token(token: &OpaqueTokenValue) -> Self {
        let fingerprint = hex::encode(Sha256::digest(token.as_str().as_bytes()));
        Self {
            lock: format!("{}{}", LOCK_PREFIX, fingerprint),
            cache: format!("{}{}", CACHE_PREFIX, fingerprint),
        }
    }
}

fn parse_cached(value: Option<String>) -> Result<Option<TokenSet>, AuthError> {
    value
        .map(|json| serde_json::from_str::<TokenSet>(&json))
        .transpose()
        .map_err(|e| AuthError::InternalError(format!("corrupt cached token set: {}", e)))
}

/// Collapses concurrent refreshes of one refresh token into a single
/// rotation; every caller receives the same token set.
pub struct RefreshCoordinator<S> {
    issuer: Arc<TokenIssuer<S>>,
    locks: Arc<dyn LockService>,
    cache: Arc<dyn ResultCache>,
    policy: RotationPolicy,
}

impl<S: Authenticatable + 'static> RefreshCoordinator<S> {
    pub fn new(
        issuer: Arc<TokenIssuer<S>>,
        locks: Arc<dyn LockService>,
        cache: Arc<dyn ResultCache>,
        policy: RotationPolicy,
    ) -> Self {
        Self {
            issuer,
            locks,
            cache,
            policy,
        }
    }

    pub async fn refresh(&self, old: &OpaqueTokenValue) -> Result<TokenSet, AuthError> {
        let keys = RotationKeys::for_token(old);

        if let Some(set) = parse_cached(self.cache.get(&keys.cache).await?)? {
            debug!(lock = %keys.lock, "reusing rotation result");
            return Ok(set);
        }
        if let Some(handle) = self.locks.acquire(&keys.lock, self.policy.lock_ttl).await? {
            return self.rotate_locked(old.clone(), keys, handle).await;
        }

        debug!(lock = %keys.lock, "rotation in progress elsewhere, waiting for its result");
        for attempt in 1..=self.policy.poll_attempts {
            tokio::time::sleep(self.policy.poll_interval).await;

            if let Some(set) = parse_cached(self.cache.get(&keys.cache).await?)? {
                debug!(lock = %keys.lock, attempt, "picked up rotation result");
                return Ok(set);
            }
            if let Some(handle) = self.locks.acquire(&keys.lock, self.policy.lock_ttl).await? {
                return self.rotate_locked(old.clone(), keys, handle).await;
            }
        }

        error!(
            lock = %keys.lock,
            attempts = self.policy.poll_attempts,
            "timed out waiting for refresh token rotation; lock holder may have crashed"
        );
        Err(AuthError::RotationTimeout)
    }

    /// Runs the rotation on its own task: a caller dropped mid-way still
    /// leaves a finished rotation, a filled cache and a released lock.
    async fn rotate_locked(
        &self,
        old: OpaqueTokenValue,
        keys: RotationKeys,
        handle: LockHandle,
    ) -> Result<TokenSet, AuthError> {
        let issuer = self.issuer.clone();
        let locks = self.locks.clone();
        let cache = self.cache.clone();
        let cache_ttl = self.policy.cache_ttl;

        let task = tokio::spawn(async move {
            let outcome =
                rotate_and_publish(&issuer, cache.as_ref(), &old, &keys.cache, cache_ttl).await;
            match outcome {
                Rotation::Unpublished(set) => {
                    // The old record is still stored until its deferred
                    // deletion; releasing now would let a sibling rotate it
                    // again. The lock lapses by its TTL instead.
                    warn!(lock = %handle.name, "keeping rotation lock until it expires");
                    Ok(set)
                }
                Rotation::Done(result) => {
                    if let Err(e) = locks.release(&handle).await {
                        warn!(lock = %handle.name, error = %e, "failed to release rotation lock");
                    }
                    result
                }
            }
        });

        task.await
            .map_err(|e| AuthError::InternalError(format!("rotation task failed: {}", e)))?
    }
}

enum Rotation {
    Done(Result<TokenSet, AuthError>),
    /// Rotated, but siblings cannot see the result.
    Unpublished(TokenSet),
}

async fn rotate_and_publish<S: Authenticatable + 'static>(
    issuer: &TokenIssuer<S>,
    cache: &dyn ResultCache,
    old: &OpaqueTokenValue,
    cache_key: &str,
    cache_ttl: Duration,
) -> Rotation {
    // A sibling may have finished between our cache miss and the grant.
    let cached = cache.get(cache_key).await.map_err(AuthError::from);
    match cached.and_then(parse_cached) {
        Ok(Some(set)) => return Rotation::Done(Ok(set)),
        Ok(None) => {}
        Err(e) => return Rotation::Done(Err(e)),
    }

    let set = match issuer.rotate(old).await {
        Ok(set) => set,
        Err(e) => return Rotation::Done(Err(e)),
    };

    let published = match serde_json::to_string(&set) {
        Ok(json) => cache.put(cache_key, &json, cache_ttl).await.map_err(AuthError::from),
        Err(e) => Err(AuthError::InternalError(format!(
            "cannot serialize token set: {}",
            e
        ))),
    };
    match published {
        Ok(()) => Rotation::Done(Ok(set)),
        Err(e) => {
            error!(error = %e, "failed to publish rotation result");
            Rotation::Unpublished(set)
        }
    }
}
