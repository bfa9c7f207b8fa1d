use super::util::is_dup_key;
use crate::domain_model::{OpaqueToken, OpaqueTokenValue, SubjectId};
use crate::domain_port::{OpaqueTokenStore, StoreError};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlOpaqueTokenStore {
    pool: MySqlPool,
}

impl MySqlOpaqueTokenStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlOpaqueTokenStore { pool }
    }

    fn row_to_token(row: MySqlRow) -> Result<OpaqueToken, StoreError> {
        let token: String = row
            .try_get("token")
            .map_err(|e| StoreError::Store(e.to_string()))?;
        let owner_id: String = row
            .try_get("owner_id")
            .map_err(|e| StoreError::Store(e.to_string()))?;
        let expires_at: DateTime<Utc> = row
            .try_get("expires_at")
            .map_err(|e| StoreError::Store(e.to_string()))?;
        let additional: Option<String> = row
            .try_get("additional")
            .map_err(|e| StoreError::Store(e.to_string()))?;

        let additional = additional
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| StoreError::InternalError(anyhow!("corrupt additional payload: {}", e)))?;

        Ok(OpaqueToken {
            token: OpaqueTokenValue(token),
            subject: SubjectId(owner_id),
            expires_at,
            additional,
        })
    }
}

#[async_trait::async_trait]
impl OpaqueTokenStore for MySqlOpaqueTokenStore {
    async fn find(&self, token: &OpaqueTokenValue) -> Result<Option<OpaqueToken>, StoreError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT token, owner_id, expires_at, additional
FROM jwt_opaque_tokens
WHERE token = ?
"#,
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_token).transpose()
    }

    async fn create(&self, token: &OpaqueToken) -> Result<(), StoreError> {
        let additional = token
            .additional
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::InternalError(e.into()))?;

        sqlx::query(
            r#"
INSERT INTO jwt_opaque_tokens (token, owner_id, expires_at, additional)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(token.token.as_str())
        .bind(token.subject.as_str())
        .bind(token.expires_at)
        .bind(additional)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                StoreError::DuplicateToken(token.token.clone())
            } else {
                StoreError::Store(e.to_string())
            }
        })?;

        Ok(())
    }

    async fn delete(&self, token: &OpaqueTokenValue) -> Result<(), StoreError> {
        sqlx::query(
            r#"
DELETE FROM jwt_opaque_tokens
WHERE token = ?
"#,
        )
        .bind(token.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Store(e.to_string()))?;

        Ok(())
    }
}
