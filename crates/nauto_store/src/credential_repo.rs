use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use nauto_model::{Credential, CredentialAttempt};
use nauto_security::{CredentialCipher, CredentialRepository, ResolverError};
use sqlx::SqlitePool;

const B64: base64::engine::general_purpose::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// SQLite-backed implementation of `nauto_security::CredentialRepository`.
/// Decrypts `password_encrypted` on read and updates the success/failure
/// counters and `last_used` tiebreak field on every recorded attempt.
pub struct SqliteCredentialRepository {
    pool: SqlitePool,
    cipher: CredentialCipher,
}

impl SqliteCredentialRepository {
    pub fn new(pool: SqlitePool, cipher: CredentialCipher) -> Self {
        SqliteCredentialRepository { pool, cipher }
    }
}

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    async fn credentials_for_tags(&self, tags: &[String]) -> Result<Vec<Credential>, ResolverError> {
        if tags.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = tags.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT DISTINCT c.id, c.username, c.password_encrypted, c.priority, c.last_used, \
                    c.success_count, c.failure_count, c.description, c.is_system \
             FROM credentials c \
             JOIN credential_tags ct ON ct.credential_id = c.id \
             JOIN tags t ON t.id = ct.tag_id \
             WHERE t.name IN ({placeholders})"
        );

        let mut query = sqlx::query_as::<_, CredentialRow>(&sql);
        for tag in tags {
            query = query.bind(tag);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ResolverError::Repository(e.to_string()))?;

        let mut credentials = Vec::with_capacity(rows.len());
        for row in rows {
            let tags = self.tags_for_credential(row.id).await?;
            credentials.push(row.into_credential(&self.cipher, tags)?);
        }
        Ok(credentials)
    }

    async fn record_attempt(&self, attempt: CredentialAttempt) -> Result<(), ResolverError> {
        sqlx::query(
            "INSERT INTO credential_attempts (credential_id, device_id, job_id, success, error, occurred_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(attempt.credential_id)
        .bind(attempt.device_id)
        .bind(attempt.job_id)
        .bind(attempt.success)
        .bind(&attempt.error)
        .bind(attempt.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| ResolverError::Repository(e.to_string()))?;

        if attempt.success {
            sqlx::query(
                "UPDATE credentials SET success_count = success_count + 1, last_used = ? WHERE id = ?",
            )
            .bind(Utc::now().to_rfc3339())
            .bind(attempt.credential_id)
            .execute(&self.pool)
            .await
        } else {
            sqlx::query("UPDATE credentials SET failure_count = failure_count + 1 WHERE id = ?")
                .bind(attempt.credential_id)
                .execute(&self.pool)
                .await
        }
        .map_err(|e| ResolverError::Repository(e.to_string()))?;

        Ok(())
    }
}

impl SqliteCredentialRepository {
    /// Collaborator-side write path: the core only ever reads credentials
    /// via [`CredentialRepository::credentials_for_tags`].
    pub async fn insert_credential(
        &self,
        username: &str,
        password: &str,
        priority: u16,
        description: Option<&str>,
        tags: &[String],
    ) -> Result<i64, ResolverError> {
        let encrypted = encrypt_for_storage(&self.cipher, password)?;
        let id = sqlx::query(
            "INSERT INTO credentials (username, password_encrypted, priority, success_count, \
                    failure_count, description, is_system) VALUES (?, ?, ?, 0, 0, ?, 0)",
        )
        .bind(username)
        .bind(encrypted)
        .bind(priority as i64)
        .bind(description)
        .execute(&self.pool)
        .await
        .map_err(|e| ResolverError::Repository(e.to_string()))?
        .last_insert_rowid();

        for tag in tags {
            sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
                .bind(tag)
                .execute(&self.pool)
                .await
                .map_err(|e| ResolverError::Repository(e.to_string()))?;
            let tag_id: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
                .bind(tag)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| ResolverError::Repository(e.to_string()))?;
            sqlx::query("INSERT INTO credential_tags (credential_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag_id)
                .execute(&self.pool)
                .await
                .map_err(|e| ResolverError::Repository(e.to_string()))?;
        }

        Ok(id)
    }

    async fn tags_for_credential(&self, credential_id: i64) -> Result<Vec<String>, ResolverError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT t.name FROM tags t \
             JOIN credential_tags ct ON ct.tag_id = t.id \
             WHERE ct.credential_id = ?",
        )
        .bind(credential_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ResolverError::Repository(e.to_string()))?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: i64,
    username: String,
    password_encrypted: String,
    priority: i64,
    last_used: Option<String>,
    success_count: i64,
    failure_count: i64,
    description: Option<String>,
    is_system: bool,
}

impl CredentialRow {
    fn into_credential(
        self,
        cipher: &CredentialCipher,
        tags: Vec<String>,
    ) -> Result<Credential, ResolverError> {
        let encrypted = B64
            .decode(self.password_encrypted.as_bytes())
            .map_err(|e| ResolverError::Repository(format!("invalid stored password: {e}")))?;
        let password = cipher
            .decrypt(&encrypted)
            .map_err(|e| ResolverError::Repository(format!("decrypt password: {e}")))?;
        let last_used = self
            .last_used
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Credential {
            id: self.id,
            username: self.username,
            password,
            priority: self.priority as u16,
            last_used,
            success_count: self.success_count as u64,
            failure_count: self.failure_count as u64,
            description: self.description,
            is_system: self.is_system,
            tags,
        })
    }
}

/// Encodes a plaintext password for storage in `password_encrypted`.
pub fn encrypt_for_storage(cipher: &CredentialCipher, plaintext: &str) -> Result<String, ResolverError> {
    let ciphertext = cipher
        .encrypt(plaintext)
        .map_err(|e| ResolverError::Repository(format!("encrypt password: {e}")))?;
    Ok(B64.encode(ciphertext))
}
