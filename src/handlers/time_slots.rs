use axum::extract::State;
use axum::http::StatusCode;
use chrono::NaiveTime;
use serde::Deserialize;
use sqlx::PgConnection;

use super::{lawyer_exists, require_not_blank};
use crate::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::models::TimeSlot;
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct TimeSlotInput {
    pub day: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl TimeSlotInput {
    pub fn validate(&self) -> ApiResult<()> {
        require_not_blank("day", &self.day)?;
        check_time_range(self.start_time, self.end_time)
    }
}

pub fn check_time_range(start_time: NaiveTime, end_time: NaiveTime) -> ApiResult<()> {
    if start_time >= end_time {
        return Err(ApiError::validation("end_time", "end_time must be after start_time."));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeSlotCreate {
    pub lawyer_id: i64,
    #[serde(flatten)]
    pub slot: TimeSlotInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeSlotPatch {
    pub day: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

impl TimeSlotPatch {
    pub fn apply(&self, current: &TimeSlot) -> TimeSlotInput {
        TimeSlotInput {
            day: self.day.clone().unwrap_or_else(|| current.day.clone()),
            start_time: self.start_time.unwrap_or(current.start_time),
            end_time: self.end_time.unwrap_or(current.end_time),
        }
    }
}

pub async fn insert_time_slot(
    conn: &mut PgConnection,
    lawyer_id: i64,
    slot: &TimeSlotInput,
) -> Result<TimeSlot, sqlx::Error> {
    sqlx::query_as::<_, TimeSlot>(
        "INSERT INTO time_slots (day, start_time, end_time, lawyer_id)
         VALUES ($1, $2, $3, $4)
         RETURNING id, day, start_time, end_time",
    )
    .bind(&slot.day)
    .bind(slot.start_time)
    .bind(slot.end_time)
    .bind(lawyer_id)
    .fetch_one(conn)
    .await
}

/// Drops every slot of the lawyer and inserts `slots` in their place.
pub async fn replace_time_slots(
    conn: &mut PgConnection,
    lawyer_id: i64,
    slots: &[TimeSlotInput],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM time_slots WHERE lawyer_id = $1")
        .bind(lawyer_id)
        .execute(&mut *conn)
        .await?;

    for slot in slots {
        insert_time_slot(&mut *conn, lawyer_id, slot).await?;
    }
    Ok(())
}

async fn fetch_time_slot(state: &AppState, id: i64) -> Result<TimeSlot, sqlx::Error> {
    sqlx::query_as::<_, TimeSlot>("SELECT id, day, start_time, end_time FROM time_slots WHERE id = $1")
        .bind(id)
        .fetch_one(&state.pool)
        .await
}

pub async fn list(State(state): State<AppState>, _caller: Caller) -> ApiResult<Json<Vec<TimeSlot>>> {
    let slots = sqlx::query_as::<_, TimeSlot>("SELECT id, day, start_time, end_time FROM time_slots ORDER BY id")
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(slots))
}

pub async fn create(
    State(state): State<AppState>,
    _caller: Caller,
    Json(input): Json<TimeSlotCreate>,
) -> ApiResult<(StatusCode, Json<TimeSlot>)> {
    input.slot.validate()?;
    if !lawyer_exists(&state.pool, input.lawyer_id).await? {
        return Err(ApiError::validation(
            "lawyer_id",
            format!("Invalid pk \"{}\" - object does not exist.", input.lawyer_id),
        ));
    }
    let mut conn = state.pool.acquire().await?;
    let slot = insert_time_slot(&mut conn, input.lawyer_id, &input.slot).await?;
    info!("Created time slot {} for lawyer {}", slot.id, input.lawyer_id);
    Ok((StatusCode::CREATED, Json(slot)))
}

pub async fn retrieve(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<i64>,
) -> ApiResult<Json<TimeSlot>> {
    Ok(Json(fetch_time_slot(&state, id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<i64>,
    Json(patch): Json<TimeSlotPatch>,
) -> ApiResult<Json<TimeSlot>> {
    let current = fetch_time_slot(&state, id).await?;
    let merged = patch.apply(&current);
    merged.validate()?;

    let slot = sqlx::query_as::<_, TimeSlot>(
        "UPDATE time_slots SET day = $2, start_time = $3, end_time = $4
         WHERE id = $1
         RETURNING id, day, start_time, end_time",
    )
    .bind(id)
    .bind(&merged.day)
    .bind(merged.start_time)
    .bind(merged.end_time)
    .fetch_one(&state.pool)
    .await?;
    info!("Updated time slot {}", id);
    Ok(Json(slot))
}

pub async fn destroy(State(state): State<AppState>, _caller: Caller, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM time_slots WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Not found."));
    }
    info!("Deleted time slot {}", id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn slots_must_end_after_they_start() {
        let slot = TimeSlotInput { day: "Monday".into(), start_time: at(10, 0), end_time: at(9, 0) };
        assert!(slot.validate().is_err());
        let empty = TimeSlotInput { day: "Monday".into(), start_time: at(10, 0), end_time: at(10, 0) };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn create_payload_flattens_the_slot() {
        let input: TimeSlotCreate = serde_json::from_value(serde_json::json!({
            "lawyer_id": 4,
            "day": "Sunday",
            "start_time": "09:00:00",
            "end_time": "11:30:00"
        }))
        .unwrap();
        assert_eq!(input.lawyer_id, 4);
        assert_eq!(input.slot.end_time, at(11, 30));
        assert!(input.slot.validate().is_ok());
    }

    #[test]
    fn patch_keeps_unset_fields() {
        let current = TimeSlot { id: 1, day: "Monday".into(), start_time: at(9, 0), end_time: at(12, 0) };
        let patch = TimeSlotPatch { end_time: Some(at(13, 0)), ..Default::default() };
        let merged = patch.apply(&current);
        assert_eq!(merged.day, "Monday");
        assert_eq!(merged.start_time, at(9, 0));
        assert_eq!(merged.end_time, at(13, 0));
    }
}
