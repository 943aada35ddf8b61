use axum::{extract::State, Json};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;

use lyceum_core::{is_acceptable_password, normalize_email, OtpChallenge, OTP_TTL_MINUTES};

use crate::error::ApiError;
use crate::handlers::auth::hash_password;
use crate::models::{ResetConfirmBody, ResetRequestBody, ResetVerifyBody, UserRow};
use crate::AppState;

// The request endpoint answers the same way whether or not the account
// exists, so it cannot be used to enumerate registered emails or phones.
const RESET_ACCEPTED: &str = "If the account exists, a reset code has been sent";

async fn find_by_identifier(db: &PgPool, identifier: &str) -> Result<Option<UserRow>, ApiError> {
    let identifier = identifier.trim();
    let as_email = normalize_email(identifier);
    Ok(sqlx::query_as::<_, UserRow>(
        "SELECT * FROM users WHERE email = $1 OR phone = $2 LIMIT 1",
    )
    .bind(&as_email)
    .bind(identifier)
    .fetch_optional(db)
    .await?)
}

fn stored_challenge(user: &UserRow) -> Option<OtpChallenge> {
    match (&user.otp_code, user.otp_expires_at) {
        (Some(code), Some(expires_at)) => Some(OtpChallenge {
            code: code.clone(),
            expires_at,
        }),
        _ => None,
    }
}

pub async fn request_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetRequestBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let identifier = payload.identifier.trim().to_string();
    if identifier.is_empty() {
        return Err(ApiError::MissingFields("identifier".to_string()));
    }

    if let Some(user) = find_by_identifier(&state.db, &identifier).await? {
        let challenge = OtpChallenge::issue(Utc::now());
        sqlx::query("UPDATE users SET otp_code = $2, otp_expires_at = $3 WHERE id = $1")
            .bind(user.id)
            .bind(&challenge.code)
            .bind(challenge.expires_at)
            .execute(&state.db)
            .await?;

        let note = format!(
            "Your password reset code is {}. It expires in {} minutes.",
            challenge.code, OTP_TTL_MINUTES
        );
        if let Err(err) = state.delivery.deliver(&identifier, &note).await {
            tracing::warn!("reset code delivery for account {} failed: {err}", user.id);
        }
        tracing::info!("Issued reset code for account {}", user.id);
    }

    Ok(Json(serde_json::json!({ "message": RESET_ACCEPTED })))
}

// Non-destructive: the same code stays valid for the confirm step.
pub async fn verify_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetVerifyBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = find_by_identifier(&state.db, &payload.identifier)
        .await?
        .ok_or(ApiError::InvalidOtp)?;
    let challenge = stored_challenge(&user).ok_or(ApiError::InvalidOtp)?;
    if !challenge.accepts(payload.otp.trim(), Utc::now()) {
        return Err(ApiError::InvalidOtp);
    }
    Ok(Json(serde_json::json!({ "valid": true })))
}

pub async fn confirm_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetConfirmBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = find_by_identifier(&state.db, &payload.identifier)
        .await?
        .ok_or(ApiError::InvalidOtp)?;
    let challenge = stored_challenge(&user).ok_or(ApiError::InvalidOtp)?;
    if !challenge.accepts(payload.otp.trim(), Utc::now()) {
        return Err(ApiError::InvalidOtp);
    }
    if !is_acceptable_password(&payload.new_password) {
        return Err(ApiError::MissingFields("new_password".to_string()));
    }

    let password_hash = hash_password(payload.new_password).await?;
    sqlx::query(
        "UPDATE users SET password_hash = $2, otp_code = NULL, otp_expires_at = NULL
         WHERE id = $1",
    )
    .bind(user.id)
    .bind(&password_hash)
    .execute(&state.db)
    .await?;

    tracing::info!("Password reset completed for account {}", user.id);
    Ok(Json(serde_json::json!({ "message": "Password updated" })))
}
