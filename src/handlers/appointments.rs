//! Appointment booking.
//!
//! Clients book against a lawyer's id; lawyers see and answer the bookings
//! made against their own profile. The answering endpoints reply with a
//! `{success, ...}` envelope instead of an error status, which is what the
//! lawyer dashboard polls.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;

use super::time_slots::check_time_range;
use super::{lawyer_exists, require_not_blank};
use crate::auth::{lawyer_profile_id, token_from_headers, user_for_token, Caller};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::models::{Appointment, AppointmentRow, AppointmentStatus, APPOINTMENT_SELECT};
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentInput {
    pub day: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl AppointmentInput {
    pub fn validate(&self) -> ApiResult<()> {
        require_not_blank("day", &self.day)?;
        check_time_range(self.start_time, self.end_time)
    }
}

pub fn failure(message: &str) -> Json<Value> {
    Json(json!({ "success": false, "message": message }))
}

pub fn success_message(message: &str) -> Json<Value> {
    Json(json!({ "success": true, "message": message }))
}

pub fn success_results(appointments: Vec<Appointment>) -> Json<Value> {
    Json(json!({ "success": true, "serialized_results": appointments }))
}

async fn fetch_appointments(pool: &PgPool, filter: &str, binds: &[i64]) -> Result<Vec<Appointment>, sqlx::Error> {
    let sql = format!("{} {}", APPOINTMENT_SELECT, filter);
    let mut query = sqlx::query_as::<_, AppointmentRow>(&sql);
    for value in binds {
        query = query.bind(*value);
    }
    let rows = query.fetch_all(pool).await?;
    Ok(rows.into_iter().map(Appointment::from).collect())
}

async fn lawyer_appointments_with_status(
    pool: &PgPool,
    lawyer_id: i64,
    status: AppointmentStatus,
    order_by: &str,
) -> Result<Vec<Appointment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
        "{} WHERE a.lawyer_id = $1 AND LOWER(a.status) = $2 ORDER BY {}",
        APPOINTMENT_SELECT, order_by
    ))
    .bind(lawyer_id)
    .bind(status.as_str())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Appointment::from).collect())
}

/// Returns false when the appointment is not one of the lawyer's.
pub async fn set_status(
    pool: &PgPool,
    appointment_id: i64,
    lawyer_id: i64,
    status: AppointmentStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE appointments SET status = $1 WHERE id = $2 AND lawyer_id = $3")
        .bind(status)
        .bind(appointment_id)
        .bind(lawyer_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Resolves the lawyer behind the `Authorization` header, or the envelope to answer with.
async fn envelope_lawyer(state: &AppState, headers: &HeaderMap) -> Result<Result<i64, Json<Value>>, ApiError> {
    let Some(key) = token_from_headers(headers) else {
        return Ok(Err(failure("Access denied. Token not provided.")));
    };
    let Some(user) = user_for_token(&state.pool, key).await? else {
        return Ok(Err(failure("Access denied. Invalid token.")));
    };
    match lawyer_profile_id(&state.pool, user.id).await? {
        Some(lawyer_id) => Ok(Ok(lawyer_id)),
        None => Ok(Err(failure("User has no lawyer profile."))),
    }
}

pub async fn client_list(
    State(state): State<AppState>,
    caller: Caller,
    Path(lawyer_id): Path<i64>,
) -> ApiResult<Json<Vec<Appointment>>> {
    if !lawyer_exists(&state.pool, lawyer_id).await? {
        return Err(ApiError::not_found("Not found."));
    }
    let client_id = caller.require_client(&state.pool, "Client profile not found.").await?;
    let appointments = fetch_appointments(
        &state.pool,
        "WHERE a.lawyer_id = $1 AND a.client_id = $2 ORDER BY a.id",
        &[lawyer_id, client_id],
    )
    .await?;
    Ok(Json(appointments))
}

pub async fn client_create(
    State(state): State<AppState>,
    caller: Caller,
    Path(lawyer_id): Path<i64>,
    Json(input): Json<AppointmentInput>,
) -> ApiResult<(StatusCode, Json<Appointment>)> {
    if !lawyer_exists(&state.pool, lawyer_id).await? {
        return Err(ApiError::not_found("Not found."));
    }
    let client_id = caller.require_client(&state.pool, "Client profile not found.").await?;
    input.validate()?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO appointments (day, start_time, end_time, lawyer_id, client_id, status)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id",
    )
    .bind(&input.day)
    .bind(input.start_time)
    .bind(input.end_time)
    .bind(lawyer_id)
    .bind(client_id)
    .bind(AppointmentStatus::Pending)
    .fetch_one(&state.pool)
    .await?;
    info!("Client {} requested appointment {} with lawyer {}", client_id, id, lawyer_id);

    let appointment = fetch_appointments(&state.pool, "WHERE a.id = $1", &[id])
        .await?
        .pop()
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn lawyer_list(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Vec<Appointment>>> {
    let lawyer_id = caller.require_lawyer(&state.pool, "Lawyer profile not found or not approved.").await?;
    let appointments = fetch_appointments(&state.pool, "WHERE a.lawyer_id = $1 ORDER BY a.id", &[lawyer_id]).await?;
    Ok(Json(appointments))
}

pub async fn lawyer_retrieve(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> ApiResult<Json<Appointment>> {
    let lawyer_id = caller.require_lawyer(&state.pool, "Lawyer profile not found or not approved.").await?;
    fetch_appointments(&state.pool, "WHERE a.id = $1 AND a.lawyer_id = $2", &[id, lawyer_id])
        .await?
        .pop()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Not found."))
}

pub async fn lawyer_destroy(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let lawyer_id = caller.require_lawyer(&state.pool, "Lawyer profile not found or not approved.").await?;
    let result = sqlx::query("DELETE FROM appointments WHERE id = $1 AND lawyer_id = $2")
        .bind(id)
        .bind(lawyer_id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Not found."));
    }
    info!("Lawyer {} deleted appointment {}", lawyer_id, id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn requests(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Value>> {
    let lawyer_id = match envelope_lawyer(&state, &headers).await? {
        Ok(id) => id,
        Err(envelope) => return Ok(envelope),
    };
    let appointments = lawyer_appointments_with_status(
        &state.pool,
        lawyer_id,
        AppointmentStatus::Pending,
        "a.day DESC, a.start_time DESC, a.id DESC",
    )
    .await?;
    Ok(success_results(appointments))
}

pub async fn accepted(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Value>> {
    let lawyer_id = match envelope_lawyer(&state, &headers).await? {
        Ok(id) => id,
        Err(envelope) => return Ok(envelope),
    };
    let appointments = lawyer_appointments_with_status(
        &state.pool,
        lawyer_id,
        AppointmentStatus::Accepted,
        "a.start_time DESC, a.id DESC",
    )
    .await?;
    Ok(success_results(appointments))
}

async fn answer(state: &AppState, caller: &Caller, id: i64, status: AppointmentStatus) -> ApiResult<Json<Value>> {
    let Some(lawyer_id) = caller.lawyer_profile_id(&state.pool).await? else {
        let verb = match status {
            AppointmentStatus::Refused => "refuse",
            _ => "accept",
        };
        return Ok(failure(&format!("You don't have permission to {} an appointment.", verb)));
    };

    if !set_status(&state.pool, id, lawyer_id, status).await? {
        return Ok(failure("Appointment not found or not associated with your profile"));
    }
    info!("Lawyer {} marked appointment {} as {}", lawyer_id, id, status);

    let message = match status {
        AppointmentStatus::Refused => "Appointment refused.",
        _ => "Appointment accepted.",
    };
    Ok(success_message(message))
}

pub async fn accept(State(state): State<AppState>, caller: Caller, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    answer(&state, &caller, id, AppointmentStatus::Accepted).await
}

pub async fn refuse(State(state): State<AppState>, caller: Caller, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    answer(&state, &caller, id, AppointmentStatus::Refused).await
}
