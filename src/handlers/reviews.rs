use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use super::lawyer_exists;
use crate::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::models::{Review, ReviewRow, REVIEW_SELECT};
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub rating: i32,
    pub comment: String,
}

impl ReviewInput {
    pub fn validate(&self) -> ApiResult<()> {
        if self.rating < 0 {
            return Err(ApiError::validation(
                "rating",
                "Ensure this value is greater than or equal to 0.",
            ));
        }
        Ok(())
    }
}

pub async fn list(State(state): State<AppState>, Path(lawyer_id): Path<i64>) -> ApiResult<Json<Vec<Review>>> {
    let rows = sqlx::query_as::<_, ReviewRow>(&format!(
        "{} WHERE r.lawyer_id = $1 ORDER BY r.created_at DESC, r.id DESC",
        REVIEW_SELECT
    ))
    .bind(lawyer_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows.into_iter().map(Review::from).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Path(lawyer_id): Path<i64>,
    Json(input): Json<ReviewInput>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    let client_id = caller.require_client(&state.pool, "Client profile not found.").await?;
    if !lawyer_exists(&state.pool, lawyer_id).await? {
        return Err(ApiError::not_found("Not found."));
    }
    input.validate()?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO reviews (lawyer_id, client_id, rating, comment) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(lawyer_id)
    .bind(client_id)
    .bind(input.rating)
    .bind(&input.comment)
    .fetch_one(&state.pool)
    .await?;
    info!("Client {} reviewed lawyer {} with {}", client_id, lawyer_id, input.rating);

    let row = sqlx::query_as::<_, ReviewRow>(&format!("{} WHERE r.id = $1", REVIEW_SELECT))
        .bind(id)
        .fetch_one(&state.pool)
        .await?;
    Ok((StatusCode::CREATED, Json(Review::from(row))))
}
