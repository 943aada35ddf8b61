use axum::{
    extract::{Path, State},
    Json,
};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use lyceum_core::Role;

use crate::error::ApiError;
use crate::models::NotificationRow;
use crate::AppState;

// Notifications are addressed by (role, user id); newest first.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Path((role, user_id)): Path<(String, Uuid)>,
) -> Result<Json<Vec<NotificationRow>>, ApiError> {
    let role = Role::from_str(&role).map_err(|_| ApiError::MissingFields("role".to_string()))?;

    let rows = sqlx::query_as::<_, NotificationRow>(
        "SELECT * FROM notifications
         WHERE user_id = $1 AND user_role = $2
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .bind(role.as_str())
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

// Marking twice is fine; the second call is a no-op that returns the row.
pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<NotificationRow>, ApiError> {
    let row = sqlx::query_as::<_, NotificationRow>(
        "UPDATE notifications SET read = TRUE WHERE id = $1 RETURNING *",
    )
    .bind(notification_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("Notification"))?;
    Ok(Json(row))
}
