use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::attachments::{documents_by_lawyer, images_by_lawyer};
use super::require_not_blank_if_set;
use crate::auth::AdminCaller;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::models::{LawyerDocument, LawyerImage, LawyerProfile, LAWYER_PROFILE_SELECT};
use crate::pagination::{Page, PageParamsRaw, Paginated};
use crate::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct AdminLawyerView {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub specialization: String,
    pub images: Vec<LawyerImage>,
    pub documents: Vec<LawyerDocument>,
    pub approved: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminLawyerPatch {
    pub approved: Option<bool>,
    pub specialization: Option<String>,
}

async fn with_attachments(pool: &PgPool, profiles: Vec<LawyerProfile>) -> Result<Vec<AdminLawyerView>, sqlx::Error> {
    let ids: Vec<i64> = profiles.iter().map(|p| p.id).collect();

    let mut images = images_by_lawyer(pool, &ids).await?;
    let mut documents = documents_by_lawyer(pool, &ids).await?;

    Ok(profiles
        .into_iter()
        .map(|p| AdminLawyerView {
            id: p.id,
            images: images.remove(&p.id).unwrap_or_default(),
            documents: documents.remove(&p.id).unwrap_or_default(),
            first_name: p.first_name,
            last_name: p.last_name,
            specialization: p.specialization,
            approved: p.approved,
        })
        .collect())
}

async fn fetch_profile(pool: &PgPool, id: i64) -> Result<LawyerProfile, sqlx::Error> {
    sqlx::query_as::<_, LawyerProfile>(&format!("{} WHERE lp.id = $1", LAWYER_PROFILE_SELECT))
        .bind(id)
        .fetch_one(pool)
        .await
}

/// True only when an update moves the profile from pending to approved.
pub fn newly_approved(was_approved: bool, patch: &AdminLawyerPatch) -> bool {
    !was_approved && patch.approved == Some(true)
}

pub async fn list(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Query(params): Query<PageParamsRaw>,
) -> ApiResult<Json<Paginated<AdminLawyerView>>> {
    let page = Page::from_params(params.parse()?, state.config.page_size, state.config.max_page_size)?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lawyer_profiles")
        .fetch_one(&state.pool)
        .await?;
    let num_pages = page.check_in_range(count)?;

    let profiles = sqlx::query_as::<_, LawyerProfile>(&format!(
        "{} ORDER BY u.first_name, u.last_name, lp.id LIMIT $1 OFFSET $2",
        LAWYER_PROFILE_SELECT
    ))
    .bind(page.size)
    .bind(page.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(Paginated {
        count,
        num_pages,
        results: with_attachments(&state.pool, profiles).await?,
    }))
}

/// Profiles only enter the dashboard through sign-up.
pub async fn create() -> ApiError {
    ApiError::MethodNotAllowed
}

pub async fn retrieve(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Path(id): Path<i64>,
) -> ApiResult<Json<AdminLawyerView>> {
    let profile = fetch_profile(&state.pool, id).await?;
    let mut views = with_attachments(&state.pool, vec![profile]).await?;
    views.pop().map(Json).ok_or_else(|| ApiError::not_found("Not found."))
}

pub async fn update(
    State(state): State<AppState>,
    AdminCaller(admin): AdminCaller,
    Path(id): Path<i64>,
    Json(patch): Json<AdminLawyerPatch>,
) -> ApiResult<Json<AdminLawyerView>> {
    require_not_blank_if_set("specialization", patch.specialization.as_ref())?;
    let before = fetch_profile(&state.pool, id).await?;

    sqlx::query(
        "UPDATE lawyer_profiles SET
            approved = COALESCE($2, approved),
            specialization = COALESCE($3, specialization)
         WHERE id = $1",
    )
    .bind(id)
    .bind(patch.approved)
    .bind(&patch.specialization)
    .execute(&state.pool)
    .await?;
    info!("Admin {} updated lawyer profile {}", admin.user.id, id);

    if newly_approved(before.approved, &patch) {
        info!(
            "Lawyer profile {} approved, approval notice queued for {}",
            id, before.email
        );
    }

    let profile = fetch_profile(&state.pool, id).await?;
    let mut views = with_attachments(&state.pool, vec![profile]).await?;
    views.pop().map(Json).ok_or_else(|| ApiError::not_found("Not found."))
}

pub async fn destroy(
    State(state): State<AppState>,
    AdminCaller(admin): AdminCaller,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM lawyer_profiles WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Not found."));
    }
    warn!("Admin {} deleted lawyer profile {}", admin.user.id, id);
    Ok(StatusCode::NO_CONTENT)
}
