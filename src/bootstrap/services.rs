use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::User;
use crate::domain_port::*;
use crate::infra_local::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::api::JwkSetView;
use crate::settings::{JwtKey, Refresh, Settings};
use anyhow::{Context, anyhow};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use nanoid::nanoid;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

const MIGRATIONS: [&str; 2] = [
    include_str!("../../migrations/mysql/0001_jwt_opaque_tokens.sql"),
    include_str!("../../migrations/mysql/0002_auth_credential.sql"),
];

enum CredentialBackend {
    Memory(Arc<MemoryCredentialRepo>),
    Mysql(Arc<MySqlCredentialRepo>),
}

/// Everything a transport needs, wired from [`Settings`].
pub struct Services {
    pub guard: Arc<JwtGuard<User>>,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn OpaqueTokenStore>,
    keyring: Arc<JwtKeyringCodec>,
    hasher: Arc<dyn CredentialHasher>,
    credentials: CredentialBackend,
    scheduler: TokioTaskScheduler,
    pool: Option<Pool<MySql>>,
    run_id: String,
}

impl Services {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        Self::try_new_with_clock(settings, Arc::new(SystemClock)).await
    }

    pub async fn try_new_with_clock(
        settings: &Settings,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let alphabet: [char; 16] = [
            '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
        ];
        let run_id = nanoid!(10, &alphabet);
        info!(%run_id, backend = ?settings.backend, "wiring services");
        check_refresh_windows(&settings.refresh)?;

        let backend = &settings.backend;
        let uses_redis = backend.store == "redis" || backend.coordination == "redis";
        let uses_mysql = backend.store == "mysql" || backend.credentials == "mysql";

        let redis_manager = match (uses_redis, &settings.redis) {
            (false, _) => None,
            (true, Some(redis)) => {
                let client = redis::Client::open(redis.dsn.as_str())?;
                Some(client.get_connection_manager().await?)
            }
            (true, None) => {
                return Err(anyhow!("a redis backend is selected but [redis] is missing"));
            }
        };
        let redis_prefix = settings
            .redis
            .as_ref()
            .map(|r| r.prefix.clone())
            .unwrap_or_default();

        let pool = match (uses_mysql, &settings.mysql) {
            (false, _) => None,
            (true, Some(mysql)) => {
                let pool = Pool::<MySql>::connect(&mysql.dsn).await?;
                for migration in MIGRATIONS {
                    sqlx::raw_sql(migration).execute(&pool).await?;
                }
                Some(pool)
            }
            (true, None) => {
                return Err(anyhow!("a mysql backend is selected but [mysql] is missing"));
            }
        };

        let store: Arc<dyn OpaqueTokenStore> = match backend.store.as_str() {
            "memory" => Arc::new(MemoryOpaqueTokenStore::new()),
            "redis" => Arc::new(RedisOpaqueTokenStore::new(
                require(&redis_manager, "redis")?,
                format!("{}:opaque", redis_prefix),
            )),
            "mysql" => Arc::new(MySqlOpaqueTokenStore::new(require(&pool, "mysql")?)),
            other => return Err(anyhow!("Unknown store backend: {}", other)),
        };

        let (locks, cache): (Arc<dyn LockService>, Arc<dyn ResultCache>) =
            match backend.coordination.as_str() {
                "memory" => (
                    Arc::new(MemoryLockService::new()),
                    Arc::new(MemoryResultCache::new()),
                ),
                "redis" => {
                    let conn = require(&redis_manager, "redis")?;
                    (
                        Arc::new(RedisLockService::new(conn.clone(), redis_prefix.clone())),
                        Arc::new(RedisResultCache::new(conn, redis_prefix.clone())),
                    )
                }
                other => return Err(anyhow!("Unknown coordination backend: {}", other)),
            };

        let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
        let (credentials, credential_repo, subjects): (
            CredentialBackend,
            Arc<dyn CredentialRepo>,
            Arc<dyn SubjectRepository<User>>,
        ) = match backend.credentials.as_str() {
            "memory" => {
                let repo = Arc::new(MemoryCredentialRepo::new());
                for seed in &settings.seed_users {
                    let hash = hasher.hash_password(&seed.password).await?;
                    repo.insert(User::new(seed.id.as_str(), seed.username.as_str()), hash, true);
                }
                (
                    CredentialBackend::Memory(repo.clone()),
                    repo.clone(),
                    repo,
                )
            }
            "mysql" => {
                let repo = Arc::new(MySqlCredentialRepo::new(require(&pool, "mysql")?));
                (CredentialBackend::Mysql(repo.clone()), repo.clone(), repo)
            }
            other => return Err(anyhow!("Unknown credentials backend: {}", other)),
        };

        let jwt = &settings.jwt;
        let keys = jwt
            .keys
            .iter()
            .map(signing_key)
            .collect::<anyhow::Result<Vec<_>>>()?;
        let keyring = Arc::new(JwtKeyringCodec::new(
            JwtConfig {
                issuer: jwt.issuer.clone(),
                audience: jwt.audience.clone(),
                access_ttl: Duration::from_secs(jwt.access_ttl_secs),
                leeway: Duration::from_secs(jwt.leeway_secs),
                expires_in_claim: jwt.expires_in_claim,
                keys,
                active_key: jwt.active_key.clone(),
            },
            clock.clone(),
        )?);
        let codec: Arc<dyn TokenCodec> = keyring.clone();
        let mapper: Arc<dyn ClaimsMapper<User>> = Arc::new(UserClaimsMapper);

        let refresh = &settings.refresh;
        let scheduler = TokioTaskScheduler::new();
        let deletion = DeferredDeletion::new(
            store.clone(),
            Arc::new(scheduler.clone()),
            Duration::from_secs(refresh.deletion_leeway_secs),
        );
        let issuer = Arc::new(TokenIssuer::new(
            codec.clone(),
            mapper.clone(),
            subjects.clone(),
            store.clone(),
            deletion,
            clock.clone(),
            Duration::from_secs(refresh.refresh_ttl_secs),
        ));
        let coordinator = RefreshCoordinator::new(
            issuer.clone(),
            locks,
            cache,
            RotationPolicy {
                lock_ttl: Duration::from_secs(refresh.lock_ttl_secs),
                cache_ttl: Duration::from_secs(refresh.cache_ttl_secs),
                poll_interval: Duration::from_millis(refresh.poll_interval_ms),
                poll_attempts: refresh.poll_attempts,
            },
        );
        let provider: Arc<dyn CredentialsProvider<User>> = Arc::new(
            PasswordCredentialsProvider::new(credential_repo, subjects, hasher.clone()),
        );

        let guard = Arc::new(JwtGuard::new(
            codec,
            mapper,
            provider,
            issuer,
            coordinator,
            BearerExtractor::new(settings.guard.header.as_str(), settings.guard.prefix.as_str()),
        ));

        Ok(Services {
            guard,
            clock,
            store,
            keyring,
            hasher,
            credentials,
            scheduler,
            pool,
            run_id,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Public halves of the signing keys, for token consumers.
    pub fn public_keys(&self) -> JwkSetView {
        JwkSetView::from(self.keyring.public_keys())
    }

    /// Registers a login for `user` with an argon2 hash of `password`.
    pub async fn add_user(&self, user: User, password: &str) -> anyhow::Result<()> {
        let hash = self.hasher.hash_password(password).await?;
        match &self.credentials {
            CredentialBackend::Memory(repo) => repo.insert(user, hash, true),
            CredentialBackend::Mysql(repo) => repo.create_credentials(&user, &hash).await?,
        }
        Ok(())
    }

    /// Flushes deferred deletions and closes connections.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
        info!(run_id = %self.run_id, "services shut down");
    }
}

// A late caller arriving after the cached result expired but before the old
// token is deleted would rotate it a second time.
fn check_refresh_windows(refresh: &Refresh) -> anyhow::Result<()> {
    if refresh.cache_ttl_secs < refresh.deletion_leeway_secs {
        return Err(anyhow!(
            "refresh.cache_ttl_secs ({}) must be at least refresh.deletion_leeway_secs ({})",
            refresh.cache_ttl_secs,
            refresh.deletion_leeway_secs
        ));
    }
    Ok(())
}

fn signing_key(key: &JwtKey) -> anyhow::Result<SigningKey> {
    let decode = |field: &str, value: &str| {
        URL_SAFE_NO_PAD
            .decode(value)
            .with_context(|| format!("jwt key {:?}: {} is not unpadded base64url", key.id, field))
    };

    match (&key.secret, &key.public) {
        (Some(secret), None) if key.private.is_none() => {
            Ok(SigningKey::secret(key.id.as_str(), secret.as_bytes()))
        }
        (None, Some(public)) => {
            let private = key
                .private
                .as_deref()
                .map(|p| decode("private", p))
                .transpose()?;
            Ok(SigningKey::ed25519(
                key.id.as_str(),
                decode("public", public)?,
                private,
            ))
        }
        _ => Err(anyhow!(
            "jwt key {:?} needs either a secret or a public/private key pair",
            key.id
        )),
    }
}

fn require<T: Clone>(resource: &Option<T>, name: &str) -> anyhow::Result<T> {
    resource
        .clone()
        .ok_or_else(|| anyhow!("{} backend selected without a {} connection", name, name))
}

