use crate::domain_model::{SubjectId, User};
use crate::domain_port::{CredentialRecord, CredentialRepo, StoreError, SubjectRepository};
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlCredentialRepo {
    pool: MySqlPool,
}

impl MySqlCredentialRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlCredentialRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<CredentialRecord, StoreError> {
        let subject_id: String = row
            .try_get("subject_id")
            .map_err(|e| StoreError::Store(e.to_string()))?;
        let username: String = row
            .try_get("username")
            .map_err(|e| StoreError::Store(e.to_string()))?;
        let password_hash: String = row
            .try_get("password_hash")
            .map_err(|e| StoreError::Store(e.to_string()))?;
        let is_active: bool = row
            .try_get("is_active")
            .map_err(|e| StoreError::Store(e.to_string()))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| StoreError::Store(e.to_string()))?;

        Ok(CredentialRecord {
            subject: SubjectId(subject_id),
            username,
            password_hash,
            is_active,
            created_at,
        })
    }

    pub async fn create_credentials(
        &self,
        user: &User,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
INSERT INTO auth_credential (subject_id, username, password_hash)
VALUES (?, ?, ?)
"#,
        )
        .bind(user.id.as_str())
        .bind(&user.username)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Store(e.to_string()))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialRepo for MySqlCredentialRepo {
    async fn get_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT subject_id, username, password_hash, is_active, created_at
FROM auth_credential
WHERE username = ?
"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn get_by_subject(
        &self,
        subject: &SubjectId,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT subject_id, username, password_hash, is_active, created_at
FROM auth_credential
WHERE subject_id = ?
"#,
        )
        .bind(subject.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }
}

#[async_trait::async_trait]
impl SubjectRepository<User> for MySqlCredentialRepo {
    async fn find(&self, id: &SubjectId) -> Result<Option<User>, StoreError> {
        let record = self.get_by_subject(id).await?;
        Ok(record.map(|r| User::new(r.subject, r.username)))
    }
}
