pub mod addresses;
pub mod admin;
pub mod appointments;
pub mod attachments;
pub mod auth;
pub mod clients;
pub mod lawyers;
pub mod reviews;
pub mod search;
pub mod time_slots;

use sqlx::PgConnection;

use crate::error::{ApiError, ApiResult};

pub(crate) fn require_not_blank(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(field, "This field may not be blank."));
    }
    Ok(())
}

/// Same as `require_not_blank` for fields a partial update may leave out.
pub(crate) fn require_not_blank_if_set(field: &str, value: Option<&String>) -> ApiResult<()> {
    match value {
        Some(v) => require_not_blank(field, v),
        None => Ok(()),
    }
}

pub(crate) async fn lawyer_exists(pool: &sqlx::PgPool, lawyer_id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM lawyer_profiles WHERE id = $1)")
        .bind(lawyer_id)
        .fetch_one(pool)
        .await
}

/// Profiles a user already holds, as `(lawyer, client)`.
///
/// Locks the user row for the rest of the transaction, so two profile
/// creations for the same user run one after the other and the second sees
/// the first.
pub(crate) async fn lock_profile_kinds(conn: &mut PgConnection, user_id: i64) -> Result<(bool, bool), sqlx::Error> {
    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM lawyer_profiles WHERE user_id = $1),
                EXISTS(SELECT 1 FROM client_profiles WHERE user_id = $1)",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
}
