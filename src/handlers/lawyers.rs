//! Lawyer profiles, scoped to the lawyer who owns them.
//!
//! A profile is written together with its address and its weekly time slots,
//! so create and update run inside one transaction. The rating is never
//! stored: it is recomputed from the reviews every time a profile is read.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use super::addresses::{insert_address, patch_address, AddressInput, AddressPatch, ADDRESS_COLUMNS};
use super::attachments::images_by_lawyer;
use super::time_slots::{insert_time_slot, replace_time_slots, TimeSlotInput};
use super::{lock_profile_kinds, require_not_blank, require_not_blank_if_set};
use crate::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::models::{Address, LawyerImage, LawyerProfile, TimeSlot, LAWYER_PROFILE_SELECT};
use crate::rating::lawyer_ratings;
use crate::AppState;

pub const LAWYER_GROUP: &str = "Lawyer";

#[derive(Debug, Clone, Serialize)]
pub struct LawyerProfileView {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub specialization: String,
    pub phone_number: String,
    pub bio: String,
    pub language: String,
    pub address: Option<Address>,
    pub time_slots: Vec<TimeSlot>,
    pub rating: f64,
    pub images: Vec<LawyerImage>,
    pub image: Option<String>,
}

#[derive(FromRow)]
struct SlotRow {
    lawyer_id: i64,
    #[sqlx(flatten)]
    slot: TimeSlot,
}

/// Loads addresses, slots, images and ratings for `profiles` in four queries.
pub async fn hydrate(pool: &PgPool, profiles: Vec<LawyerProfile>) -> Result<Vec<LawyerProfileView>, sqlx::Error> {
    if profiles.is_empty() {
        return Ok(Vec::new());
    }
    let lawyer_ids: Vec<i64> = profiles.iter().map(|p| p.id).collect();
    let address_ids: Vec<i64> = profiles.iter().map(|p| p.address_id).collect();

    let addresses: HashMap<i64, Address> = sqlx::query_as::<_, Address>(&format!(
        "SELECT {} FROM addresses WHERE id = ANY($1)",
        ADDRESS_COLUMNS
    ))
    .bind(&address_ids)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|a| (a.id, a))
    .collect();

    let mut slots: HashMap<i64, Vec<TimeSlot>> = HashMap::new();
    let slot_rows = sqlx::query_as::<_, SlotRow>(
        "SELECT lawyer_id, id, day, start_time, end_time FROM time_slots
         WHERE lawyer_id = ANY($1) ORDER BY id",
    )
    .bind(&lawyer_ids)
    .fetch_all(pool)
    .await?;
    for row in slot_rows {
        slots.entry(row.lawyer_id).or_default().push(row.slot);
    }

    let mut images = images_by_lawyer(pool, &lawyer_ids).await?;

    let ratings = lawyer_ratings(pool, &lawyer_ids).await?;

    Ok(profiles
        .into_iter()
        .map(|p| LawyerProfileView {
            id: p.id,
            address: addresses.get(&p.address_id).cloned(),
            time_slots: slots.remove(&p.id).unwrap_or_default(),
            rating: ratings.get(&p.id).copied().unwrap_or(0.0),
            images: images.remove(&p.id).unwrap_or_default(),
            first_name: p.first_name,
            last_name: p.last_name,
            specialization: p.specialization,
            phone_number: p.phone_number,
            bio: p.bio,
            language: p.language,
            image: p.image,
        })
        .collect())
}

pub async fn hydrate_one(pool: &PgPool, profile: LawyerProfile) -> Result<LawyerProfileView, sqlx::Error> {
    hydrate(pool, vec![profile])
        .await?
        .pop()
        .ok_or(sqlx::Error::RowNotFound)
}

async fn owned_profile(pool: &PgPool, id: i64, user_id: i64) -> Result<Option<LawyerProfile>, sqlx::Error> {
    sqlx::query_as::<_, LawyerProfile>(&format!("{} WHERE lp.id = $1 AND lp.user_id = $2", LAWYER_PROFILE_SELECT))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

#[derive(Debug, Clone, Deserialize)]
pub struct LawyerProfileCreate {
    pub specialization: String,
    pub phone_number: String,
    pub bio: String,
    pub language: String,
    pub address: AddressInput,
    #[serde(default)]
    pub time_slots: Option<Vec<TimeSlotInput>>,
}

impl LawyerProfileCreate {
    pub fn validate(&self) -> ApiResult<()> {
        require_not_blank("specialization", &self.specialization)?;
        require_not_blank("phone_number", &self.phone_number)?;
        require_not_blank("bio", &self.bio)?;
        require_not_blank("language", &self.language)?;
        self.address.validate()?;
        for slot in self.time_slots.iter().flatten() {
            slot.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LawyerProfilePatch {
    pub specialization: Option<String>,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub language: Option<String>,
    pub address: Option<AddressPatch>,
    pub time_slots: Option<Vec<TimeSlotInput>>,
}

impl LawyerProfilePatch {
    pub fn validate(&self) -> ApiResult<()> {
        require_not_blank_if_set("specialization", self.specialization.as_ref())?;
        require_not_blank_if_set("phone_number", self.phone_number.as_ref())?;
        require_not_blank_if_set("bio", self.bio.as_ref())?;
        require_not_blank_if_set("language", self.language.as_ref())?;
        if let Some(address) = &self.address {
            address.validate()?;
        }
        for slot in self.time_slots.iter().flatten() {
            slot.validate()?;
        }
        Ok(())
    }

    /// An empty list leaves the existing slots alone.
    pub fn replacement_slots(&self) -> Option<&[TimeSlotInput]> {
        match &self.time_slots {
            Some(slots) if !slots.is_empty() => Some(slots),
            _ => None,
        }
    }
}

pub async fn list(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Vec<LawyerProfileView>>> {
    let profiles = sqlx::query_as::<_, LawyerProfile>(&format!(
        "{} WHERE lp.user_id = $1 ORDER BY u.first_name, u.last_name",
        LAWYER_PROFILE_SELECT
    ))
    .bind(caller.user.id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(hydrate(&state.pool, profiles).await?))
}

pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<LawyerProfileCreate>,
) -> ApiResult<(StatusCode, Json<LawyerProfileView>)> {
    let user_id = caller.user.id;
    let mut tx = state.pool.begin().await?;
    let (is_lawyer, is_client) = lock_profile_kinds(&mut tx, user_id).await?;
    if is_client {
        return Err(ApiError::forbidden("Clients cannot create a lawyer profile"));
    }
    if is_lawyer {
        return Err(ApiError::forbidden("Lawyer profile already exists for the user"));
    }
    input.validate()?;

    let address = insert_address(&mut tx, &input.address).await?;

    let lawyer_id: i64 = sqlx::query_scalar(
        "INSERT INTO lawyer_profiles (user_id, specialization, phone_number, bio, address_id, language, image)
         VALUES ($1, $2, $3, $4, $5, $6, (SELECT image FROM user_profiles WHERE user_id = $1))
         RETURNING id",
    )
    .bind(user_id)
    .bind(&input.specialization)
    .bind(&input.phone_number)
    .bind(&input.bio)
    .bind(address.id)
    .bind(&input.language)
    .fetch_one(&mut *tx)
    .await?;

    for slot in input.time_slots.iter().flatten() {
        insert_time_slot(&mut tx, lawyer_id, slot).await?;
    }

    sqlx::query("INSERT INTO user_groups (user_id, name) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(user_id)
        .bind(LAWYER_GROUP)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Created lawyer profile {} for user {}", lawyer_id, user_id);
    let profile = owned_profile(&state.pool, lawyer_id, user_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok((StatusCode::CREATED, Json(hydrate_one(&state.pool, profile).await?)))
}

pub async fn retrieve(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> ApiResult<Json<LawyerProfileView>> {
    let profile = owned_profile(&state.pool, id, caller.user.id)
        .await?
        .filter(|p| p.approved)
        .ok_or_else(|| ApiError::not_found("Lawyer profile not found or not approved."))?;
    Ok(Json(hydrate_one(&state.pool, profile).await?))
}

pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(patch): Json<LawyerProfilePatch>,
) -> ApiResult<Json<LawyerProfileView>> {
    let current = owned_profile(&state.pool, id, caller.user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;
    patch.validate()?;

    let mut tx = state.pool.begin().await?;
    sqlx::query(
        "UPDATE lawyer_profiles SET
            specialization = COALESCE($2, specialization),
            phone_number = COALESCE($3, phone_number),
            bio = COALESCE($4, bio),
            language = COALESCE($5, language)
         WHERE id = $1",
    )
    .bind(id)
    .bind(&patch.specialization)
    .bind(&patch.phone_number)
    .bind(&patch.bio)
    .bind(&patch.language)
    .execute(&mut *tx)
    .await?;

    if let Some(address) = &patch.address {
        patch_address(&mut tx, current.address_id, address).await?;
    }
    if let Some(slots) = patch.replacement_slots() {
        replace_time_slots(&mut tx, id, slots).await?;
    }
    tx.commit().await?;
    info!("Updated lawyer profile {}", id);

    let profile = owned_profile(&state.pool, id, caller.user.id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok(Json(hydrate_one(&state.pool, profile).await?))
}

pub async fn destroy(State(state): State<AppState>, caller: Caller, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM lawyer_profiles WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(caller.user.id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Not found."));
    }
    info!("Deleted lawyer profile {}", id);
    Ok(StatusCode::NO_CONTENT)
}
