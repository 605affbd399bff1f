//! Login session repository.
//!
//! Tokens are random alphanumeric strings handed to the client once; only
//! their SHA-256 hex digest is stored.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use pocket_core::{
    defaults::{SESSION_TOKEN_LEN, SESSION_TOKEN_PREFIX},
    new_v7, Error, IssuedSession, Result, Session, SessionRepository,
};

/// PostgreSQL implementation of SessionRepository.
pub struct PgSessionRepository {
    pool: Pool<Postgres>,
}

impl PgSessionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Generate a new opaque session token.
    pub fn generate_token() -> String {
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::thread_rng();
        let body: String = (0..SESSION_TOKEN_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect();
        format!("{}{}", SESSION_TOKEN_PREFIX, body)
    }

    /// Hash a token using SHA256.
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create(&self, user_id: Uuid, ttl_hours: i64) -> Result<IssuedSession> {
        let id = new_v7();
        let token = Self::generate_token();
        let now = Utc::now();
        let expires = now + Duration::hours(ttl_hours);

        sqlx::query(
            "INSERT INTO user_session (id, user_id, token_hash, created_at_utc, expires_at_utc)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(user_id)
        .bind(Self::hash_token(&token))
        .bind(now)
        .bind(expires)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(subsystem = "db", component = "sessions", op = "create", user_id = %user_id, "Session issued");

        Ok(IssuedSession {
            token,
            session: Session {
                id,
                user_id,
                created_at_utc: now,
                expires_at_utc: expires,
            },
        })
    }

    async fn validate(&self, token: &str) -> Result<Option<Session>> {
        if !token.starts_with(SESSION_TOKEN_PREFIX) {
            return Ok(None);
        }

        let row = sqlx::query(
            "SELECT id, user_id, created_at_utc, expires_at_utc FROM user_session
             WHERE token_hash = $1 AND expires_at_utc > NOW()",
        )
        .bind(Self::hash_token(token))
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| Session {
            id: r.get("id"),
            user_id: r.get("user_id"),
            created_at_utc: r.get("created_at_utc"),
            expires_at_utc: r.get("expires_at_utc"),
        }))
    }

    async fn revoke(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM user_session WHERE token_hash = $1")
            .bind(Self::hash_token(token))
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_session WHERE expires_at_utc <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_shape() {
        let token = PgSessionRepository::generate_token();
        assert!(token.starts_with(SESSION_TOKEN_PREFIX));
        assert_eq!(token.len(), SESSION_TOKEN_PREFIX.len() + SESSION_TOKEN_LEN);
        assert!(token[SESSION_TOKEN_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = PgSessionRepository::generate_token();
        let b = PgSessionRepository::generate_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_token_is_sha256_hex() {
        let hash = PgSessionRepository::hash_token("pu_sess_abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, PgSessionRepository::hash_token("pu_sess_abc"));
        assert_ne!(hash, PgSessionRepository::hash_token("pu_sess_abd"));
    }
}
