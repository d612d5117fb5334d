use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::addresses::{insert_address, patch_address, AddressInput, AddressPatch, ADDRESS_COLUMNS};
use super::{lock_profile_kinds, require_not_blank, require_not_blank_if_set};
use crate::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::models::{Address, ClientProfile};
use crate::AppState;

const CLIENT_COLUMNS: &str = "id, age, gender, phone_number, address_id";

#[derive(Debug, Clone, Serialize)]
pub struct ClientProfileView {
    pub id: i64,
    pub age: i32,
    pub gender: String,
    pub phone_number: String,
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientProfileCreate {
    pub age: i32,
    pub gender: String,
    pub phone_number: String,
    pub address: AddressInput,
}

impl ClientProfileCreate {
    pub fn validate(&self) -> ApiResult<()> {
        require_not_blank("gender", &self.gender)?;
        require_not_blank("phone_number", &self.phone_number)?;
        self.address.validate()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientProfilePatch {
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<AddressPatch>,
}

impl ClientProfilePatch {
    pub fn validate(&self) -> ApiResult<()> {
        require_not_blank_if_set("gender", self.gender.as_ref())?;
        require_not_blank_if_set("phone_number", self.phone_number.as_ref())?;
        match &self.address {
            Some(address) => address.validate(),
            None => Ok(()),
        }
    }
}

async fn view(pool: &PgPool, profile: ClientProfile) -> Result<ClientProfileView, sqlx::Error> {
    let address = sqlx::query_as::<_, Address>(&format!("SELECT {} FROM addresses WHERE id = $1", ADDRESS_COLUMNS))
        .bind(profile.address_id)
        .fetch_optional(pool)
        .await?;
    Ok(ClientProfileView {
        id: profile.id,
        age: profile.age,
        gender: profile.gender,
        phone_number: profile.phone_number,
        address,
    })
}

/// Lawyers never see client profiles, not even an empty list.
async fn reject_lawyers(pool: &PgPool, caller: &Caller) -> ApiResult<()> {
    if caller.lawyer_profile_id(pool).await?.is_some() {
        return Err(ApiError::forbidden("Client cannot see a client profile"));
    }
    Ok(())
}

async fn owned_profile(pool: &PgPool, id: i64, user_id: i64) -> ApiResult<ClientProfile> {
    sqlx::query_as::<_, ClientProfile>(&format!(
        "SELECT {} FROM client_profiles WHERE id = $1 AND user_id = $2",
        CLIENT_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Not found."))
}

pub async fn list(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Vec<ClientProfileView>>> {
    reject_lawyers(&state.pool, &caller).await?;
    let profiles = sqlx::query_as::<_, ClientProfile>(&format!(
        "SELECT {} FROM client_profiles WHERE user_id = $1 ORDER BY id",
        CLIENT_COLUMNS
    ))
    .bind(caller.user.id)
    .fetch_all(&state.pool)
    .await?;

    let mut views = Vec::with_capacity(profiles.len());
    for profile in profiles {
        views.push(view(&state.pool, profile).await?);
    }
    Ok(Json(views))
}

pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<ClientProfileCreate>,
) -> ApiResult<(StatusCode, Json<ClientProfileView>)> {
    let mut tx = state.pool.begin().await?;
    let (is_lawyer, is_client) = lock_profile_kinds(&mut tx, caller.user.id).await?;
    if is_lawyer {
        return Err(ApiError::forbidden("Lawyers cannot create a client profile"));
    }
    if is_client {
        return Err(ApiError::forbidden("Client profile already exists for the user"));
    }
    input.validate()?;

    let address = insert_address(&mut tx, &input.address).await?;
    let profile = sqlx::query_as::<_, ClientProfile>(&format!(
        "INSERT INTO client_profiles (user_id, age, gender, phone_number, address_id)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {}",
        CLIENT_COLUMNS
    ))
    .bind(caller.user.id)
    .bind(input.age)
    .bind(&input.gender)
    .bind(&input.phone_number)
    .bind(address.id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    info!("Created client profile {} for user {}", profile.id, caller.user.id);
    Ok((
        StatusCode::CREATED,
        Json(ClientProfileView {
            id: profile.id,
            age: profile.age,
            gender: profile.gender,
            phone_number: profile.phone_number,
            address: Some(address),
        }),
    ))
}

pub async fn retrieve(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> ApiResult<Json<ClientProfileView>> {
    reject_lawyers(&state.pool, &caller).await?;
    let profile = owned_profile(&state.pool, id, caller.user.id).await?;
    Ok(Json(view(&state.pool, profile).await?))
}

pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(patch): Json<ClientProfilePatch>,
) -> ApiResult<Json<ClientProfileView>> {
    reject_lawyers(&state.pool, &caller).await?;
    let current = owned_profile(&state.pool, id, caller.user.id).await?;
    patch.validate()?;

    let mut tx = state.pool.begin().await?;
    let profile = sqlx::query_as::<_, ClientProfile>(&format!(
        "UPDATE client_profiles SET
            age = COALESCE($2, age),
            gender = COALESCE($3, gender),
            phone_number = COALESCE($4, phone_number)
         WHERE id = $1
         RETURNING {}",
        CLIENT_COLUMNS
    ))
    .bind(id)
    .bind(patch.age)
    .bind(&patch.gender)
    .bind(&patch.phone_number)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(address) = &patch.address {
        patch_address(&mut tx, current.address_id, address).await?;
    }
    tx.commit().await?;
    info!("Updated client profile {}", id);

    Ok(Json(view(&state.pool, profile).await?))
}

pub async fn destroy(State(state): State<AppState>, caller: Caller, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    reject_lawyers(&state.pool, &caller).await?;
    let result = sqlx::query("DELETE FROM client_profiles WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(caller.user.id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Not found."));
    }
    info!("Deleted client profile {}", id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_requires_an_address() {
        let missing = serde_json::from_value::<ClientProfileCreate>(json!({
            "age": 30,
            "gender": "female",
            "phone_number": "555"
        }));
        assert!(missing.is_err());
    }

    #[test]
    fn patch_validates_nested_address() {
        let patch: ClientProfilePatch = serde_json::from_value(json!({
            "age": 31,
            "address": { "city": "" }
        }))
        .unwrap();
        let err = patch.validate().unwrap_err();
        assert!(matches!(err, ApiError::Validation { ref field, .. } if field == "city"));
    }

    #[test]
    fn blank_gender_is_rejected() {
        let input: ClientProfileCreate = serde_json::from_value(json!({
            "age": 30,
            "gender": "",
            "phone_number": "555",
            "address": {
                "street": "s", "city": "c", "state": "st", "zip_code": "z", "country": "co"
            }
        }))
        .unwrap();
        assert!(input.validate().is_err());
    }
}
