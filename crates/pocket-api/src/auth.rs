//! Session authentication.
//!
//! The session token travels in the `pocket_session` cookie or as an
//! `Authorization: Bearer` header. Only its SHA-256 hash is stored.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use tracing::debug;

use pocket_core::{defaults, Error, Result, Session, SessionRepository, User, UserRepository};

use crate::{ApiError, AppState};

pub const SESSION_INVALID: &str = "Session invalid. Please sign in again.";

/// Extractor that requires a valid session belonging to an existing user.
#[derive(Debug, Clone)]
pub struct RequireSession {
    pub user: User,
    pub session: Session,
    pub token: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;

        let session = state
            .db
            .sessions
            .validate(&token)
            .await?
            .ok_or_else(ApiError::unauthorized)?;

        // Sessions can outlive their user (account removed, database reset).
        let user = match state.db.users.get(session.user_id).await? {
            Some(user) => user,
            None => {
                debug!(user_id = %session.user_id, "Session refers to a missing user");
                return Err(ApiError::Unauthorized(SESSION_INVALID.to_string()));
            }
        };

        Ok(RequireSession {
            user,
            session,
            token,
        })
    }
}

/// Token from `Authorization: Bearer`, falling back to the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == defaults::SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// `Set-Cookie` value for a new session.
pub fn session_cookie(token: &str, ttl_hours: i64, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        defaults::SESSION_COOKIE,
        token,
        ttl_hours * 3600,
        if secure { "; Secure" } else { "" }
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
        defaults::SESSION_COOKIE,
        if secure { "; Secure" } else { "" }
    )
}

/// Argon2id PHC hash of a password.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a password against a stored PHC hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn test_token_from_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer pu_sess_abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("pocket_session=pu_sess_cookie"));
        assert_eq!(session_token(&headers).as_deref(), Some("pu_sess_abc"));
    }

    #[test]
    fn test_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; pocket_session=pu_sess_xyz; lang=en"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("pu_sess_xyz"));
    }

    #[test]
    fn test_no_token() {
        let mut headers = HeaderMap::new();
        assert!(session_token(&headers).is_none());

        headers.insert(header::COOKIE, HeaderValue::from_static("pocket_session="));
        assert!(session_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert!(session_token(&headers).is_none());
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("tok", 720, true);
        assert!(cookie.starts_with("pocket_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=2592000"));
        assert!(cookie.ends_with("; Secure"));

        let cleared = clear_session_cookie(false);
        assert!(cleared.contains("Max-Age=0"));
        assert!(!cleared.contains("Secure"));
    }
}
