use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub log: Log,
    pub jwt: Jwt,
    #[serde(default)]
    pub refresh: Refresh,
    #[serde(default)]
    pub guard: Guard,
    pub backend: Backend,
    pub redis: Option<Redis>,
    pub mysql: Option<Mysql>,
    /// Logins created at startup by the in-memory credential backend.
    #[serde(default)]
    pub seed_users: Vec<SeedUser>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Jwt {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
    #[serde(default = "default_true")]
    pub expires_in_claim: bool,
    pub active_key: String,
    pub keys: Vec<JwtKey>,
}

/// Either a shared `secret` (HS256) or an Ed25519 pair: unpadded base64url
/// `public` key plus, for keys this process signs with, the PKCS#8 `private`
/// key in the same encoding.
#[derive(Deserialize)]
pub struct JwtKey {
    pub id: String,
    pub secret: Option<String>,
    pub public: Option<String>,
    pub private: Option<String>,
}

impl std::fmt::Debug for JwtKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKey").field("id", &self.id).finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Refresh {
    pub refresh_ttl_secs: u64,
    pub deletion_leeway_secs: u64,
    pub lock_ttl_secs: u64,
    pub cache_ttl_secs: u64,
    pub poll_interval_ms: u64,
    pub poll_attempts: u32,
}

impl Default for Refresh {
    fn default() -> Self {
        Refresh {
            refresh_ttl_secs: 60 * 24 * 60 * 60, // 2 months
            deletion_leeway_secs: 10,
            lock_ttl_secs: 10,
            cache_ttl_secs: 10,
            poll_interval_ms: 100,
            poll_attempts: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Guard {
    pub header: String,
    pub prefix: String,
}

impl Default for Guard {
    fn default() -> Self {
        Guard {
            header: "Authorization".to_string(),
            prefix: "Bearer".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Backend {
    pub store: String,        // "memory", "redis" or "mysql"
    pub coordination: String, // "memory" or "redis"
    pub credentials: String,  // "memory" or "mysql"
}

#[derive(Debug, Deserialize)]
pub struct Redis {
    pub dsn: String,
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Mysql {
    pub dsn: String,
}

#[derive(Deserialize)]
pub struct SeedUser {
    pub id: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SeedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedUser")
            .field("id", &self.id)
            .field("username", &self.username)
            .finish()
    }
}

fn default_access_ttl_secs() -> u64 {
    2 * 60 * 60
}

fn default_leeway_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_redis_prefix() -> String {
    "tokenwarden".to_string()
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(toml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn optional_sections_fall_back_to_defaults() {
        let settings = parse(
            r#"
[log]
filter = "debug"

[jwt]
active_key = "k1"
keys = [{ id = "k1", secret = "s" }]

[backend]
store = "memory"
coordination = "memory"
credentials = "memory"
"#,
        );

        assert_eq!(settings.jwt.access_ttl_secs, 7200);
        assert_eq!(settings.jwt.leeway_secs, 60);
        assert!(settings.jwt.expires_in_claim);
        assert_eq!(settings.refresh.poll_attempts, 10);
        assert_eq!(settings.refresh.poll_interval_ms, 100);
        assert_eq!(settings.guard.header, "Authorization");
        assert!(settings.redis.is_none());
        assert!(settings.seed_users.is_empty());
    }

    #[test]
    fn secrets_are_not_printed() {
        let settings = parse(
            r#"
[log]
filter = "info"

[jwt]
active_key = "k1"
keys = [{ id = "k1", secret = "top-secret" }]

[backend]
store = "memory"
coordination = "memory"
credentials = "memory"

[[seed_users]]
id = "42"
username = "alice"
password = "hunter2"
"#,
        );

        let printed = format!("{:?}", settings);
        assert!(!printed.contains("top-secret"));
        assert!(!printed.contains("hunter2"));
    }
}
