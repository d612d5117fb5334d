//! Social sign-in and token checks.
//!
//! The provider handshake happens upstream; these endpoints receive the
//! verified provider profile and turn it into a local user plus token.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use url::Url;

use crate::auth::{client_profile_id, get_or_create_token, lawyer_profile_id, user_for_token, Caller};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::models::User;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Github,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialProfile {
    pub provider: Provider,
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub picture: Option<String>,
}

impl SocialProfile {
    pub fn validate(&self) -> ApiResult<()> {
        if self.id.trim().is_empty() {
            return Err(ApiError::validation("id", "This field may not be blank."));
        }
        if !self.email.contains('@') {
            return Err(ApiError::validation("email", "Enter a valid email address."));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub token: String,
    pub data: Value,
    pub redirect: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        UserView {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

/// The frontend picks the token and the provider payload off the query string.
pub fn login_redirect(base: &Url, token: &str, data: &Value) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("token", token)
        .append_pair("data", &data.to_string());
    url
}

fn sign_in_response(state: &AppState, token: String, profile: &SocialProfile) -> ApiResult<SignInResponse> {
    let data = serde_json::to_value(profile)
        .map_err(|e| ApiError::validation("non_field_errors", e.to_string()))?;
    let redirect = login_redirect(&state.config.frontend_login_url, &token, &data).to_string();
    Ok(SignInResponse { token, data, redirect })
}

pub async fn social_signup(
    State(state): State<AppState>,
    Json(profile): Json<SocialProfile>,
) -> ApiResult<Json<SignInResponse>> {
    profile.validate()?;
    let mut tx = state.pool.begin().await?;

    // A user who signs up twice just signs in.
    sqlx::query(
        "INSERT INTO users (username, email, first_name, last_name)
         VALUES ($1, $1, $2, $3)
         ON CONFLICT (username) DO NOTHING",
    )
    .bind(&profile.email)
    .bind(&profile.given_name)
    .bind(&profile.family_name)
    .execute(&mut *tx)
    .await?;
    let user_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(&profile.email)
        .fetch_one(&mut *tx)
        .await?;

    let insert_profile = match profile.provider {
        Provider::Google => {
            "INSERT INTO user_profiles (user_id, google_id, image) VALUES ($1, $2, $3) ON CONFLICT (user_id) DO NOTHING"
        }
        Provider::Github => {
            "INSERT INTO user_profiles (user_id, github_id, image) VALUES ($1, $2, $3) ON CONFLICT (user_id) DO NOTHING"
        }
    };
    sqlx::query(insert_profile)
        .bind(user_id)
        .bind(&profile.id)
        .bind(&profile.picture)
        .execute(&mut *tx)
        .await?;

    let token = get_or_create_token(&mut tx, user_id).await?;
    tx.commit().await?;
    info!("Signed up user {} through {:?}", user_id, profile.provider);

    Ok(Json(sign_in_response(&state, token, &profile)?))
}

pub async fn social_login(State(state): State<AppState>, Json(profile): Json<SocialProfile>) -> ApiResult<Response> {
    profile.validate()?;
    let user_id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(&profile.email)
        .fetch_optional(&state.pool)
        .await?;

    let Some(user_id) = user_id else {
        info!("Login for unknown user {}, sending to sign-up", profile.email);
        let body = json!({
            "detail": "No account for this email. Sign up first.",
            "signup": "/auth/social/signup"
        });
        return Ok((StatusCode::NOT_FOUND, Json(body)).into_response());
    };

    let mut conn = state.pool.acquire().await?;
    let token = get_or_create_token(&mut conn, user_id).await?;
    info!("User {} logged in through {:?}", user_id, profile.provider);
    Ok(Json(sign_in_response(&state, token, &profile)?).into_response())
}

pub async fn me(caller: Caller) -> Json<UserView> {
    Json(UserView::from(caller.user))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Lawyer,
    Client,
}

impl Role {
    fn refusal(&self) -> &'static str {
        match self {
            Role::Admin => "Is not admin.",
            Role::Lawyer => "Is not lawyer.",
            Role::Client => "Is not client.",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(default)]
    pub token: String,
}

pub fn verdict(success: bool, message: &str) -> Json<Value> {
    Json(json!({ "success": success, "message": message }))
}

async fn has_role(pool: &PgPool, user: &User, role: Role) -> Result<bool, sqlx::Error> {
    Ok(match role {
        Role::Admin => user.is_superuser,
        Role::Lawyer => lawyer_profile_id(pool, user.id).await?.is_some(),
        Role::Client => client_profile_id(pool, user.id).await?.is_some(),
    })
}

pub async fn verify(state: &AppState, token: &str, role: Role) -> ApiResult<Json<Value>> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(verdict(false, "Token is invalid."));
    }
    let Some(user) = user_for_token(&state.pool, token).await? else {
        return Ok(verdict(false, "Exception: Token is invalid."));
    };
    if has_role(&state.pool, &user, role).await? {
        Ok(verdict(true, "Token is valid."))
    } else {
        Ok(verdict(false, role.refusal()))
    }
}

pub async fn verify_admin(State(state): State<AppState>, Query(params): Query<VerifyParams>) -> ApiResult<Json<Value>> {
    verify(&state, &params.token, Role::Admin).await
}

pub async fn verify_lawyer(State(state): State<AppState>, Query(params): Query<VerifyParams>) -> ApiResult<Json<Value>> {
    verify(&state, &params.token, Role::Lawyer).await
}

pub async fn verify_client(State(state): State<AppState>, Query(params): Query<VerifyParams>) -> ApiResult<Json<Value>> {
    verify(&state, &params.token, Role::Client).await
}
