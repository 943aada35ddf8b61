use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

// Every handler funnels failures through this enum so the status mapping
// stays in one place. Storage failures surface as 503 rather than 500:
// the request was well-formed, the backing store was not reachable.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    Duplicate(&'static str),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Not authorized")]
    Forbidden,

    #[error("Course is full")]
    CourseFull,

    #[error("Invalid or expired OTP")]
    InvalidOtp,

    #[error("Missing or invalid fields: {0}")]
    MissingFields(String),

    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Storage unavailable")]
    Storage(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    // For inserts racing against a unique index; the index decides, the
    // loser of the race gets the same answer a sequential duplicate would.
    pub fn conflict_on(entity: &'static str) -> impl FnOnce(sqlx::Error) -> ApiError {
        move |err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::Duplicate(entity),
            _ => ApiError::Storage(err),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Duplicate(_) | ApiError::CourseFull => StatusCode::CONFLICT,
            ApiError::InvalidCredentials | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::InvalidOtp | ApiError::MissingFields(_) | ApiError::MalformedPayload => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Stable machine-readable token; clients branch on this, not on the
    // message text.
    fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::Duplicate(_) => "duplicate_key",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::InvalidToken => "invalid_token",
            ApiError::Forbidden => "forbidden",
            ApiError::CourseFull => "course_full",
            ApiError::InvalidOtp => "invalid_otp",
            ApiError::MissingFields(_) => "missing_fields",
            ApiError::MalformedPayload => "malformed_payload",
            ApiError::Storage(_) => "storage_unavailable",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Storage(err) => tracing::error!("storage error: {err}"),
            ApiError::Internal(err) => tracing::error!("internal error: {err:#}"),
            _ => {}
        }
        (
            self.status(),
            Json(serde_json::json!({
                "error": self.kind(),
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}
