//! Gallery images and PDF documents attached to a lawyer profile.
//!
//! Only the stored path is tracked here; uploading and serving the files is
//! somebody else's job.

use std::collections::HashMap;
use std::path::Path as FsPath;

use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use sqlx::{FromRow, PgPool};

use super::lawyer_exists;
use crate::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};
use crate::models::{LawyerDocument, LawyerImage};
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct ImageInput {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    pub pdf_file: String,
}

impl DocumentInput {
    pub fn validate(&self) -> ApiResult<()> {
        validate_pdf(&self.pdf_file)
    }
}

/// Accepts plain paths and URLs; query strings and fragments are ignored.
pub fn validate_pdf(file: &str) -> ApiResult<()> {
    let path = file.split(['?', '#']).next().unwrap_or_default();
    let extension = FsPath::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if extension.eq_ignore_ascii_case("pdf") {
        return Ok(());
    }
    Err(ApiError::validation(
        "pdf_file",
        format!("File extension \"{}\" is not allowed. Allowed extensions are: pdf.", extension),
    ))
}

/// Writes need the caller to own the profile; a missing profile is a 404.
async fn require_owner(pool: &PgPool, caller: &Caller, lawyer_id: i64) -> ApiResult<()> {
    if !lawyer_exists(pool, lawyer_id).await? {
        return Err(ApiError::not_found("Not found."));
    }
    if caller.lawyer_profile_id(pool).await? != Some(lawyer_id) {
        return Err(ApiError::forbidden("You do not own this lawyer profile."));
    }
    Ok(())
}

#[derive(FromRow)]
struct ImageRow {
    lawyer_id: i64,
    #[sqlx(flatten)]
    image: LawyerImage,
}

#[derive(FromRow)]
struct DocumentRow {
    lawyer_id: i64,
    #[sqlx(flatten)]
    document: LawyerDocument,
}

/// Gallery images for each of `lawyer_ids`, oldest first.
pub async fn images_by_lawyer(
    pool: &PgPool,
    lawyer_ids: &[i64],
) -> Result<HashMap<i64, Vec<LawyerImage>>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ImageRow>(
        "SELECT lawyer_id, id, image FROM lawyer_images WHERE lawyer_id = ANY($1) ORDER BY id",
    )
    .bind(lawyer_ids)
    .fetch_all(pool)
    .await?;
    let mut images: HashMap<i64, Vec<LawyerImage>> = HashMap::new();
    for row in rows {
        images.entry(row.lawyer_id).or_default().push(row.image);
    }
    Ok(images)
}

pub async fn documents_by_lawyer(
    pool: &PgPool,
    lawyer_ids: &[i64],
) -> Result<HashMap<i64, Vec<LawyerDocument>>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DocumentRow>(
        "SELECT lawyer_id, id, pdf_file FROM lawyer_documents WHERE lawyer_id = ANY($1) ORDER BY id",
    )
    .bind(lawyer_ids)
    .fetch_all(pool)
    .await?;
    let mut documents: HashMap<i64, Vec<LawyerDocument>> = HashMap::new();
    for row in rows {
        documents.entry(row.lawyer_id).or_default().push(row.document);
    }
    Ok(documents)
}

fn not_found_if_untouched(rows: u64) -> ApiResult<()> {
    if rows == 0 {
        return Err(ApiError::not_found("Not found."));
    }
    Ok(())
}

pub async fn list_images(
    State(state): State<AppState>,
    _caller: Caller,
    Path(lawyer_id): Path<i64>,
) -> ApiResult<Json<Vec<LawyerImage>>> {
    let images = sqlx::query_as::<_, LawyerImage>("SELECT id, image FROM lawyer_images WHERE lawyer_id = $1 ORDER BY id")
        .bind(lawyer_id)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(images))
}

pub async fn create_image(
    State(state): State<AppState>,
    caller: Caller,
    Path(lawyer_id): Path<i64>,
    Json(input): Json<ImageInput>,
) -> ApiResult<(StatusCode, Json<LawyerImage>)> {
    require_owner(&state.pool, &caller, lawyer_id).await?;
    let image = sqlx::query_as::<_, LawyerImage>(
        "INSERT INTO lawyer_images (lawyer_id, image) VALUES ($1, $2) RETURNING id, image",
    )
    .bind(lawyer_id)
    .bind(&input.image)
    .fetch_one(&state.pool)
    .await?;
    info!("Added image {} to lawyer {}", image.id, lawyer_id);
    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn retrieve_image(
    State(state): State<AppState>,
    _caller: Caller,
    Path((lawyer_id, id)): Path<(i64, i64)>,
) -> ApiResult<Json<LawyerImage>> {
    let image = sqlx::query_as::<_, LawyerImage>("SELECT id, image FROM lawyer_images WHERE id = $1 AND lawyer_id = $2")
        .bind(id)
        .bind(lawyer_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(Json(image))
}

pub async fn update_image(
    State(state): State<AppState>,
    caller: Caller,
    Path((lawyer_id, id)): Path<(i64, i64)>,
    Json(input): Json<ImageInput>,
) -> ApiResult<Json<LawyerImage>> {
    require_owner(&state.pool, &caller, lawyer_id).await?;
    let image = sqlx::query_as::<_, LawyerImage>(
        "UPDATE lawyer_images SET image = $3 WHERE id = $1 AND lawyer_id = $2 RETURNING id, image",
    )
    .bind(id)
    .bind(lawyer_id)
    .bind(&input.image)
    .fetch_one(&state.pool)
    .await?;
    info!("Updated image {} of lawyer {}", id, lawyer_id);
    Ok(Json(image))
}

pub async fn destroy_image(
    State(state): State<AppState>,
    caller: Caller,
    Path((lawyer_id, id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    require_owner(&state.pool, &caller, lawyer_id).await?;
    let result = sqlx::query("DELETE FROM lawyer_images WHERE id = $1 AND lawyer_id = $2")
        .bind(id)
        .bind(lawyer_id)
        .execute(&state.pool)
        .await?;
    not_found_if_untouched(result.rows_affected())?;
    info!("Deleted image {} of lawyer {}", id, lawyer_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_documents(
    State(state): State<AppState>,
    _caller: Caller,
    Path(lawyer_id): Path<i64>,
) -> ApiResult<Json<Vec<LawyerDocument>>> {
    let documents = sqlx::query_as::<_, LawyerDocument>(
        "SELECT id, pdf_file FROM lawyer_documents WHERE lawyer_id = $1 ORDER BY id",
    )
    .bind(lawyer_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(documents))
}

pub async fn create_document(
    State(state): State<AppState>,
    caller: Caller,
    Path(lawyer_id): Path<i64>,
    Json(input): Json<DocumentInput>,
) -> ApiResult<(StatusCode, Json<LawyerDocument>)> {
    input.validate()?;
    require_owner(&state.pool, &caller, lawyer_id).await?;
    let document = sqlx::query_as::<_, LawyerDocument>(
        "INSERT INTO lawyer_documents (lawyer_id, pdf_file) VALUES ($1, $2) RETURNING id, pdf_file",
    )
    .bind(lawyer_id)
    .bind(&input.pdf_file)
    .fetch_one(&state.pool)
    .await?;
    info!("Added document {} to lawyer {}", document.id, lawyer_id);
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn retrieve_document(
    State(state): State<AppState>,
    _caller: Caller,
    Path((lawyer_id, id)): Path<(i64, i64)>,
) -> ApiResult<Json<LawyerDocument>> {
    let document = sqlx::query_as::<_, LawyerDocument>(
        "SELECT id, pdf_file FROM lawyer_documents WHERE id = $1 AND lawyer_id = $2",
    )
    .bind(id)
    .bind(lawyer_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(document))
}

pub async fn update_document(
    State(state): State<AppState>,
    caller: Caller,
    Path((lawyer_id, id)): Path<(i64, i64)>,
    Json(input): Json<DocumentInput>,
) -> ApiResult<Json<LawyerDocument>> {
    input.validate()?;
    require_owner(&state.pool, &caller, lawyer_id).await?;
    let document = sqlx::query_as::<_, LawyerDocument>(
        "UPDATE lawyer_documents SET pdf_file = $3 WHERE id = $1 AND lawyer_id = $2 RETURNING id, pdf_file",
    )
    .bind(id)
    .bind(lawyer_id)
    .bind(&input.pdf_file)
    .fetch_one(&state.pool)
    .await?;
    info!("Updated document {} of lawyer {}", id, lawyer_id);
    Ok(Json(document))
}

pub async fn destroy_document(
    State(state): State<AppState>,
    caller: Caller,
    Path((lawyer_id, id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    require_owner(&state.pool, &caller, lawyer_id).await?;
    let result = sqlx::query("DELETE FROM lawyer_documents WHERE id = $1 AND lawyer_id = $2")
        .bind(id)
        .bind(lawyer_id)
        .execute(&state.pool)
        .await?;
    not_found_if_untouched(result.rows_affected())?;
    info!("Deleted document {} of lawyer {}", id, lawyer_id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_extension_is_case_insensitive() {
        assert!(validate_pdf("core/docs/license.pdf").is_ok());
        assert!(validate_pdf("core/docs/LICENSE.PDF").is_ok());
        assert!(validate_pdf("https://cdn.example.com/docs/bar.pdf?sig=abc").is_ok());
    }

    #[test]
    fn other_extensions_are_rejected() {
        let err = validate_pdf("core/docs/license.docx").unwrap_err();
        match err {
            ApiError::Validation { field, message } => {
                assert_eq!(field, "pdf_file");
                assert!(message.contains("\"docx\""));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(validate_pdf("core/docs/pdf").is_err());
        assert!(validate_pdf("").is_err());
    }
}
