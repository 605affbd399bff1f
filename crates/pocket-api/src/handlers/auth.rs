//! Account and session handlers.

use std::sync::OnceLock;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use pocket_core::{defaults, NewUser, SessionRepository, User, UserRepository};

use crate::auth::{
    clear_session_cookie, hash_password, session_cookie, session_token, verify_password,
};
use crate::{ApiError, AppState};

const MISSING_CRED: &str = "Missing cred";
const INVALID_CREDENTIALS: &str = "Invalid credentials";

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Signup input after validation: trimmed name, lowercased email.
#[derive(Debug, PartialEq)]
pub struct ValidSignup {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    pub fn validate(self) -> Result<ValidSignup, ApiError> {
        let (Some(name), Some(email), Some(password)) = (self.name, self.email, self.password)
        else {
            return Err(ApiError::BadRequest(MISSING_CRED.to_string()));
        };

        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::BadRequest("Name is required".to_string()));
        }
        if name.chars().count() > defaults::NAME_MAX_CHARS {
            return Err(ApiError::BadRequest("Name is too long".to_string()));
        }

        let email = email.trim().to_lowercase();
        if !email_pattern().is_match(&email) {
            return Err(ApiError::BadRequest("Enter a valid email".to_string()));
        }

        let len = password.chars().count();
        if len < defaults::PASSWORD_MIN_CHARS {
            return Err(ApiError::BadRequest(format!(
                "Password must be at least {} characters",
                defaults::PASSWORD_MIN_CHARS
            )));
        }
        if len > defaults::PASSWORD_MAX_CHARS {
            return Err(ApiError::BadRequest(format!(
                "Password must be at most {} characters",
                defaults::PASSWORD_MAX_CHARS
            )));
        }

        Ok(ValidSignup {
            name,
            email,
            password,
        })
    }
}

/// Create an account. 201 with the new id; 409 when the email is taken.
pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let input = req.validate()?;

    if state.db.users.find_by_email(&input.email).await?.is_some() {
        return Err(ApiError::Conflict("Email ID already exists".to_string()));
    }

    let password = input.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))??;

    // A concurrent signup can still win the race; the unique index reports it
    // as a conflict.
    let id = state
        .db
        .users
        .create(NewUser {
            name: input.name,
            email: input.email,
            password_hash,
        })
        .await?;

    info!(subsystem = "api", component = "auth", user_id = %id, "User registered");
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SigninResponse {
    pub id: Uuid,
    pub name: String,
    /// Same value as the cookie, for clients that send `Authorization: Bearer`.
    pub token: String,
}

async fn find_account(state: &AppState, identifier: &str) -> Result<Option<User>, ApiError> {
    if identifier.contains('@') {
        Ok(state
            .db
            .users
            .find_by_email(&identifier.to_lowercase())
            .await?)
    } else {
        Ok(state.db.users.find_by_name(identifier).await?)
    }
}

/// Sign in with email (or display name) and password.
pub async fn signin(
    State(state): State<AppState>,
    body: Result<Json<SigninRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;

    let identifier = req
        .email
        .or(req.username)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let (Some(identifier), Some(password)) = (identifier, req.password.filter(|p| !p.is_empty()))
    else {
        return Err(ApiError::BadRequest(MISSING_CRED.to_string()));
    };

    let Some(user) = find_account(&state, &identifier).await? else {
        debug!(subsystem = "api", component = "auth", "Sign-in for unknown account");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    let stored = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| ApiError::Internal(format!("Password check task failed: {}", e)))?;
    if !valid {
        debug!(subsystem = "api", component = "auth", user_id = %user.id, "Wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let issued = state
        .db
        .sessions
        .create(user.id, state.config.session_ttl_hours)
        .await?;
    let cookie = session_cookie(
        &issued.token,
        state.config.session_ttl_hours,
        state.config.cookie_secure,
    );

    info!(
        subsystem = "api",
        component = "auth",
        user_id = %user.id,
        session_id = %issued.session.id,
        "Session issued"
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(SigninResponse {
            id: user.id,
            name: user.name,
            token: issued.token,
        }),
    ))
}

/// Revoke the caller's session, if any, and clear the cookie.
pub async fn signout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = session_token(&headers) {
        state.db.sessions.revoke(&token).await?;
    }
    Ok((
        [(
            header::SET_COOKIE,
            clear_session_cookie(state.config.cookie_secure),
        )],
        Json(json!({ "success": true })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: Option<&str>, email: Option<&str>, password: Option<&str>) -> SignupRequest {
        SignupRequest {
            name: name.map(String::from),
            email: email.map(String::from),
            password: password.map(String::from),
        }
    }

    fn message(err: ApiError) -> String {
        match err {
            ApiError::BadRequest(msg) => msg,
            other => panic!("expected BadRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_signup_normalizes_input() {
        let valid = request(Some("  Ada "), Some(" Ada@Example.COM "), Some("longenough"))
            .validate()
            .unwrap();
        assert_eq!(valid.name, "Ada");
        assert_eq!(valid.email, "ada@example.com");
    }

    #[test]
    fn test_signup_missing_fields() {
        let err = request(None, Some("a@b.co"), Some("longenough"))
            .validate()
            .unwrap_err();
        assert_eq!(message(err), "Missing cred");
    }

    #[test]
    fn test_signup_field_rules() {
        let cases = [
            (request(Some(" "), Some("a@b.co"), Some("longenough")), "Name is required"),
            (
                request(Some(&"n".repeat(101)), Some("a@b.co"), Some("longenough")),
                "Name is too long",
            ),
            (request(Some("Ada"), Some("not-an-email"), Some("longenough")), "Enter a valid email"),
            (
                request(Some("Ada"), Some("a@b.co"), Some("short")),
                "Password must be at least 8 characters",
            ),
            (
                request(Some("Ada"), Some("a@b.co"), Some(&"p".repeat(129))),
                "Password must be at most 128 characters",
            ),
        ];
        for (req, expected) in cases {
            assert_eq!(message(req.validate().unwrap_err()), expected);
        }
    }

    #[test]
    fn test_email_pattern() {
        assert!(email_pattern().is_match("user@example.com"));
        assert!(!email_pattern().is_match("user@example"));
        assert!(!email_pattern().is_match("us er@example.com"));
    }
}
