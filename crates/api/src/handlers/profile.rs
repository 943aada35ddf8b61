use axum::{extract::Path, extract::State, Json};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{ProfileView, UpdateProfileRequest, UserRow};
use crate::AppState;

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ProfileView>, ApiError> {
    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Account"))?;

    Ok(Json(user.into()))
}

// Partial update: absent fields keep their stored value. Email, role and
// password are not editable here.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileView>, ApiError> {
    let user = sqlx::query_as::<_, UserRow>(
        "UPDATE users SET
            first_name      = COALESCE($2, first_name),
            last_name       = COALESCE($3, last_name),
            phone           = COALESCE($4, phone),
            institution     = COALESCE($5, institution),
            major           = COALESCE($6, major),
            year_level      = COALESCE($7, year_level),
            department      = COALESCE($8, department),
            position        = COALESCE($9, position),
            experience      = COALESCE($10, experience),
            subjects        = COALESCE($11, subjects),
            bio             = COALESCE($12, bio),
            profile_picture = COALESCE($13, profile_picture)
         WHERE id = $1
         RETURNING *",
    )
    .bind(payload.user_id)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.phone)
    .bind(&payload.institution)
    .bind(&payload.major)
    .bind(&payload.year_level)
    .bind(&payload.department)
    .bind(&payload.position)
    .bind(&payload.experience)
    .bind(&payload.subjects)
    .bind(&payload.bio)
    .bind(&payload.profile_picture)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("Account"))?;

    tracing::info!("Updated profile for account {}", user.id);
    Ok(Json(user.into()))
}
