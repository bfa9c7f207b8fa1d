use crate::domain_model::{OpaqueToken, OpaqueTokenValue};
use crate::domain_port::{OpaqueTokenStore, StoreError};
use anyhow::anyhow;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Refresh-token records as JSON strings. Keys carry no TTL: expiry is judged
/// by the issuer and superseded records are removed by deferred deletion.
pub struct RedisOpaqueTokenStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisOpaqueTokenStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisOpaqueTokenStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, token: &OpaqueTokenValue) -> String {
        format!("{}:{}", self.prefix, token.as_str())
    }
}

#[async_trait::async_trait]
impl OpaqueTokenStore for RedisOpaqueTokenStore {
    async fn find(&self, token: &OpaqueTokenValue) -> Result<Option<OpaqueToken>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(self.key(token))
            .await
            .map_err(|e| StoreError::Store(e.to_string()))?;

        raw.map(|json| {
            serde_json::from_str::<OpaqueToken>(&json)
                .map_err(|e| StoreError::InternalError(anyhow!("corrupt token record: {}", e)))
        })
        .transpose()
    }

    async fn create(&self, token: &OpaqueToken) -> Result<(), StoreError> {
        let json = serde_json::to_string(token).map_err(|e| StoreError::InternalError(e.into()))?;
        let mut conn = self.conn.clone();
        let created: bool = conn
            .set_nx(self.key(&token.token), json)
            .await
            .map_err(|e| StoreError::Store(e.to_string()))?;

        if !created {
            return Err(StoreError::DuplicateToken(token.token.clone()));
        }
        Ok(())
    }

    async fn delete(&self, token: &OpaqueTokenValue) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(self.key(token))
            .await
            .map_err(|e| StoreError::Store(e.to_string()))?;
        Ok(())
    }
}
