#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokenwarden::application_impl::*;
use tokenwarden::application_port::*;
use tokenwarden::domain_model::*;
use tokenwarden::domain_port::*;
use tokenwarden::infra_local::*;

pub const LEEWAY: Duration = Duration::from_secs(10);
pub const PASSWORD: &str = "wonderland";

pub fn jwt_config(kid: &str, secret: &str) -> JwtConfig {
    JwtConfig {
        issuer: Some("tokenwarden.test".to_string()),
        audience: Some("api".to_string()),
        access_ttl: Duration::from_secs(2 * 60 * 60),
        leeway: Duration::from_secs(60),
        expires_in_claim: true,
        keys: vec![SigningKey::secret(kid, secret.as_bytes())],
        active_key: kid.to_string(),
    }
}

/// Store wrapper counting successful creations, i.e. issued refresh tokens.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryOpaqueTokenStore,
    creates: AtomicUsize,
}

impl CountingStore {
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl OpaqueTokenStore for CountingStore {
    async fn find(&self, token: &OpaqueTokenValue) -> Result<Option<OpaqueToken>, StoreError> {
        self.inner.find(token).await
    }

    async fn create(&self, token: &OpaqueToken) -> Result<(), StoreError> {
        self.inner.create(token).await?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, token: &OpaqueTokenValue) -> Result<(), StoreError> {
        self.inner.delete(token).await
    }
}

/// A lock somebody else holds forever.
pub struct HeldLock;

#[async_trait::async_trait]
impl LockService for HeldLock {
    async fn acquire(&self, _: &str, _: Duration) -> Result<Option<LockHandle>, CacheError> {
        Ok(None)
    }

    async fn release(&self, _: &LockHandle) -> Result<(), CacheError> {
        Ok(())
    }
}

/// A cache that loses every write.
pub struct UnwritableCache;

#[async_trait::async_trait]
impl ResultCache for UnwritableCache {
    async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn put(&self, _: &str, _: &str, _: Duration) -> Result<(), CacheError> {
        Err(CacheError::Store("cache is read-only".to_string()))
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<CountingStore>,
    pub users: Arc<MemoryCredentialRepo>,
    pub scheduler: TokioTaskScheduler,
    pub codec: Arc<JwtKeyringCodec>,
    pub issuer: Arc<TokenIssuer<User>>,
    pub guard: Arc<JwtGuard<User>>,
}

pub struct HarnessBuilder {
    locks: Arc<dyn LockService>,
    cache: Arc<dyn ResultCache>,
    guard_codec: Option<Arc<dyn TokenCodec>>,
    mapper: Arc<dyn ClaimsMapper<User>>,
    extractor: BearerExtractor,
}

impl HarnessBuilder {
    pub fn locks(mut self, locks: Arc<dyn LockService>) -> Self {
        self.locks = locks;
        self
    }

    pub fn cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Codec the guard decodes bearer tokens with; defaults to the issuing one.
    pub fn guard_codec(mut self, codec: Arc<dyn TokenCodec>) -> Self {
        self.guard_codec = Some(codec);
        self
    }

    pub fn mapper(mut self, mapper: Arc<dyn ClaimsMapper<User>>) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn extractor(mut self, extractor: BearerExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub async fn build(self) -> Harness {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(CountingStore::default());
        let users = Arc::new(MemoryCredentialRepo::new());
        let hasher = Arc::new(Argon2PasswordHasher);
        let hash = hasher.hash_password(PASSWORD).await.unwrap();
        users.insert(User::new("42", "alice"), hash, true);

        let codec = Arc::new(
            JwtKeyringCodec::new(jwt_config("k1", "secret-one"), clock.clone()).unwrap(),
        );
        let scheduler = TokioTaskScheduler::new();
        let deletion = DeferredDeletion::new(store.clone(), Arc::new(scheduler.clone()), LEEWAY);
        let issuer = Arc::new(TokenIssuer::new(
            codec.clone(),
            self.mapper.clone(),
            users.clone(),
            store.clone(),
            deletion,
            clock.clone(),
            Duration::from_secs(60 * 24 * 60 * 60),
        ));
        let coordinator = RefreshCoordinator::new(
            issuer.clone(),
            self.locks,
            self.cache,
            RotationPolicy::default(),
        );
        let provider: Arc<PasswordCredentialsProvider<User>> =
            Arc::new(PasswordCredentialsProvider::new(users.clone(), users.clone(), hasher));
        let guard_codec = self
            .guard_codec
            .unwrap_or_else(|| codec.clone() as Arc<dyn TokenCodec>);
        let guard = Arc::new(JwtGuard::new(
            guard_codec,
            self.mapper,
            provider,
            issuer.clone(),
            coordinator,
            self.extractor,
        ));

        Harness {
            clock,
            store,
            users,
            scheduler,
            codec,
            issuer,
            guard,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            locks: Arc::new(MemoryLockService::new()),
            cache: Arc::new(MemoryResultCache::new()),
            guard_codec: None,
            mapper: Arc::new(UserClaimsMapper),
            extractor: BearerExtractor::default(),
        }
    }

    pub async fn new() -> Harness {
        Self::builder().build().await
    }

    pub async fn login(&self) -> TokenSet {
        self.guard
            .issue_with_credentials(&Credentials::new("alice", PASSWORD))
            .await
            .unwrap()
            .expect("alice can log in")
    }
}
