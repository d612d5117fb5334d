//! Token authentication.
//!
//! Every user owns at most one 40-character token, sent back in the
//! `Authorization` header either bare or as `Token <key>` / `Bearer <key>`.
//! Roles are not stored on the user: a caller is a lawyer or a client by
//! virtue of owning the matching profile row, and an administrator when the
//! user is a superuser.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use rand::RngCore;
use sqlx::{PgConnection, PgPool};

use crate::error::ApiError;
use crate::models::User;
use crate::AppState;

pub const TOKEN_BYTES: usize = 20;

pub fn generate_key() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?.trim_start();
    let key = raw
        .strip_prefix("Token ")
        .or_else(|| raw.strip_prefix("Bearer "))
        .unwrap_or(raw)
        .trim();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

pub async fn user_for_token(pool: &PgPool, key: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.is_superuser
         FROM auth_tokens t JOIN users u ON u.id = t.user_id
         WHERE t.key = $1",
    )
    .bind(key)
    .fetch_optional(pool)
    .await
}

pub async fn get_or_create_token(conn: &mut PgConnection, user_id: i64) -> Result<String, sqlx::Error> {
    sqlx::query("INSERT INTO auth_tokens (key, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
        .bind(generate_key())
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query_scalar("SELECT key FROM auth_tokens WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
}

pub async fn lawyer_profile_id(pool: &PgPool, user_id: i64) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM lawyer_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn client_profile_id(pool: &PgPool, user_id: i64) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM client_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// An authenticated request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: User,
}

impl Caller {
    pub async fn lawyer_profile_id(&self, pool: &PgPool) -> Result<Option<i64>, sqlx::Error> {
        lawyer_profile_id(pool, self.user.id).await
    }

    pub async fn client_profile_id(&self, pool: &PgPool) -> Result<Option<i64>, sqlx::Error> {
        client_profile_id(pool, self.user.id).await
    }

    pub async fn require_lawyer(&self, pool: &PgPool, message: &str) -> Result<i64, ApiError> {
        self.lawyer_profile_id(pool)
            .await?
            .ok_or_else(|| ApiError::forbidden(message))
    }

    pub async fn require_client(&self, pool: &PgPool, message: &str) -> Result<i64, ApiError> {
        self.client_profile_id(pool)
            .await?
            .ok_or_else(|| ApiError::forbidden(message))
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = token_from_headers(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided."))?;

        match user_for_token(&state.pool, key).await? {
            Some(user) => Ok(Caller { user }),
            None => {
                debug!("Rejected unknown token");
                Err(ApiError::unauthorized("Invalid token."))
            }
        }
    }
}

/// An authenticated superuser.
#[derive(Debug, Clone)]
pub struct AdminCaller(pub Caller);

impl FromRequestParts<AppState> for AdminCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        if !caller.user.is_superuser {
            warn!("User {} tried to reach the admin dashboard", caller.user.id);
            return Err(ApiError::forbidden("You do not have permission to perform this action."));
        }
        Ok(AdminCaller(caller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn generated_keys_are_forty_hex_chars() {
        let key = generate_key();
        assert_eq!(key.len(), 40);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(key, generate_key());
    }

    #[test]
    fn bare_and_prefixed_tokens_are_accepted() {
        assert_eq!(token_from_headers(&headers("abc123")), Some("abc123"));
        assert_eq!(token_from_headers(&headers("Token abc123")), Some("abc123"));
        assert_eq!(token_from_headers(&headers("Bearer abc123")), Some("abc123"));
    }

    #[test]
    fn empty_or_missing_tokens_are_none() {
        assert_eq!(token_from_headers(&HeaderMap::new()), None);
        assert_eq!(token_from_headers(&headers("Token ")), None);
        assert_eq!(token_from_headers(&headers("   ")), None);
    }
}
