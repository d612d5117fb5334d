use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            ApiError::Unauthorized(detail) | ApiError::Forbidden(detail) | ApiError::NotFound(detail) => {
                json!({ "detail": detail })
            }
            ApiError::MethodNotAllowed => json!({ "error": "Method Not Allowed" }),
            ApiError::Validation { field, message } => json!({ field.as_str(): [message] }),
            ApiError::Database(_) => json!({ "detail": "Internal server error." }),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found("Not found."),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                let field = db
                    .constraint()
                    .and_then(field_from_constraint)
                    .unwrap_or("non_field_errors");
                ApiError::validation(field, "already exists")
            }
            other => ApiError::Database(other),
        }
    }
}

/// Postgres names unique constraints `<table>_<column>_key`.
fn field_from_constraint(constraint: &str) -> Option<&str> {
    let trimmed = constraint.strip_suffix("_key")?;
    ["google_id", "github_id", "username", "user_id", "key"]
        .into_iter()
        .find(|field| trimmed.ends_with(field))
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let text = rejection.body_text();
        debug!("Rejected request body: {}", text);
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::validation("non_field_errors", "Expected a JSON request body.")
            }
            _ => field_error(&text),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        let text = rejection.body_text();
        debug!("Rejected query string: {}", text);
        field_error(&text)
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        debug!("Rejected path: {}", rejection.body_text());
        ApiError::not_found("Not found.")
    }
}

/// Turns a serde failure such as `"...: start_time: premature end of input"`
/// into a validation error keyed by the offending field.
fn field_error(text: &str) -> ApiError {
    let detail = text.split_once(": ").map_or(text, |(_, rest)| rest);

    let (path, message) = match detail.split_once(": ") {
        Some((path, message)) if is_field_path(path) => (Some(path), message),
        _ => (None, detail),
    };

    if let Some(missing) = missing_field(message) {
        let field = match path {
            Some(path) => format!("{}.{}", path, missing),
            None => missing.to_string(),
        };
        return ApiError::validation(field, "This field is required.");
    }
    ApiError::validation(path.unwrap_or("non_field_errors"), message)
}

fn is_field_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'))
}

fn missing_field(message: &str) -> Option<&str> {
    let rest = message.split_once("missing field `")?.1;
    rest.split_once('`').map(|(field, _)| field)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Database(ref e) = self {
            error!("Database error: {}", e);
        }
        (self.status(), Json(self.body())).into_response()
    }
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to connect to DB: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
