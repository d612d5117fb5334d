use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Deserializer};
use sqlx::PgConnection;

use super::{require_not_blank, require_not_blank_if_set};
use crate::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::models::Address;
use crate::AppState;

pub const ADDRESS_COLUMNS: &str = "id, street, city, state, zip_code, country, latitude, longitude";

#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl AddressInput {
    pub fn validate(&self) -> ApiResult<()> {
        require_not_blank("street", &self.street)?;
        require_not_blank("city", &self.city)?;
        require_not_blank("state", &self.state)?;
        require_not_blank("zip_code", &self.zip_code)?;
        require_not_blank("country", &self.country)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressPatch {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    /// `Some(None)` clears the stored coordinate.
    #[serde(default, deserialize_with = "present")]
    pub latitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub longitude: Option<Option<f64>>,
}

/// Tells a field sent as `null` (`Some(None)`) from one left out (`None`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl AddressPatch {
    pub fn validate(&self) -> ApiResult<()> {
        require_not_blank_if_set("street", self.street.as_ref())?;
        require_not_blank_if_set("city", self.city.as_ref())?;
        require_not_blank_if_set("state", self.state.as_ref())?;
        require_not_blank_if_set("zip_code", self.zip_code.as_ref())?;
        require_not_blank_if_set("country", self.country.as_ref())
    }
}

pub async fn insert_address(conn: &mut PgConnection, input: &AddressInput) -> Result<Address, sqlx::Error> {
    sqlx::query_as::<_, Address>(&format!(
        "INSERT INTO addresses (street, city, state, zip_code, country, latitude, longitude)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {}",
        ADDRESS_COLUMNS
    ))
    .bind(&input.street)
    .bind(&input.city)
    .bind(&input.state)
    .bind(&input.zip_code)
    .bind(&input.country)
    .bind(input.latitude)
    .bind(input.longitude)
    .fetch_one(conn)
    .await
}

/// Fields left out of the patch keep their stored value; `null` coordinates are cleared.
pub async fn patch_address(conn: &mut PgConnection, id: i64, patch: &AddressPatch) -> Result<Address, sqlx::Error> {
    sqlx::query_as::<_, Address>(&format!(
        "UPDATE addresses SET
            street = COALESCE($2, street),
            city = COALESCE($3, city),
            state = COALESCE($4, state),
            zip_code = COALESCE($5, zip_code),
            country = COALESCE($6, country),
            latitude = CASE WHEN $7 THEN $8 ELSE latitude END,
            longitude = CASE WHEN $9 THEN $10 ELSE longitude END
         WHERE id = $1
         RETURNING {}",
        ADDRESS_COLUMNS
    ))
    .bind(id)
    .bind(&patch.street)
    .bind(&patch.city)
    .bind(&patch.state)
    .bind(&patch.zip_code)
    .bind(&patch.country)
    .bind(patch.latitude.is_some())
    .bind(patch.latitude.flatten())
    .bind(patch.longitude.is_some())
    .bind(patch.longitude.flatten())
    .fetch_one(conn)
    .await
}

pub async fn list(State(state): State<AppState>, _caller: Caller) -> ApiResult<Json<Vec<Address>>> {
    let addresses = sqlx::query_as::<_, Address>(&format!("SELECT {} FROM addresses ORDER BY id", ADDRESS_COLUMNS))
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(addresses))
}

pub async fn create(
    State(state): State<AppState>,
    _caller: Caller,
    Json(input): Json<AddressInput>,
) -> ApiResult<(StatusCode, Json<Address>)> {
    input.validate()?;
    let mut conn = state.pool.acquire().await?;
    let address = insert_address(&mut conn, &input).await?;
    info!("Created address {}", address.id);
    Ok((StatusCode::CREATED, Json(address)))
}

pub async fn retrieve(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<i64>,
) -> ApiResult<Json<Address>> {
    let address = sqlx::query_as::<_, Address>(&format!("SELECT {} FROM addresses WHERE id = $1", ADDRESS_COLUMNS))
        .bind(id)
        .fetch_one(&state.pool)
        .await?;
    Ok(Json(address))
}

pub async fn update(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<i64>,
    Json(patch): Json<AddressPatch>,
) -> ApiResult<Json<Address>> {
    patch.validate()?;
    let mut conn = state.pool.acquire().await?;
    let address = patch_address(&mut conn, id, &patch).await?;
    info!("Updated address {}", id);
    Ok(Json(address))
}

pub async fn destroy(State(state): State<AppState>, _caller: Caller, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM addresses WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Not found."));
    }
    info!("Deleted address {}", id);
    Ok(StatusCode::NO_CONTENT)
}
