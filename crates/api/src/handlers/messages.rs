use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use lyceum_core::{trimmed_non_empty, NotificationDraft, Role};

use crate::error::ApiError;
use crate::fanout;
use crate::models::{MessageRow, SendMessageRequest};
use crate::AppState;

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let sender_role = Role::from_str(&payload.sender_role)
        .map_err(|_| ApiError::MissingFields("sender_role".to_string()))?;
    let recipient_role = Role::from_str(&payload.recipient_role)
        .map_err(|_| ApiError::MissingFields("recipient_role".to_string()))?;
    let content =
        trimmed_non_empty(&payload.content).ok_or(ApiError::MissingFields("content".to_string()))?;
    let subject = payload.subject.as_deref().and_then(trimmed_non_empty);

    let row = sqlx::query_as::<_, MessageRow>(
        "INSERT INTO messages (id, sender_id, sender_role, recipient_id, recipient_role,
                               subject, content)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(payload.sender_id)
    .bind(sender_role.as_str())
    .bind(payload.recipient_id)
    .bind(recipient_role.as_str())
    .bind(subject)
    .bind(content)
    .fetch_one(&state.db)
    .await?;

    let draft =
        NotificationDraft::message_received(row.recipient_id, recipient_role, row.subject.as_deref());
    fanout::persist(&state.db, &[draft]).await;

    tracing::info!(
        "Message {} sent from {} to {}",
        row.id,
        row.sender_id,
        row.recipient_id
    );
    Ok((StatusCode::CREATED, Json(row)))
}

// Both directions of a mailbox, newest first.
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<MessageRow>>, ApiError> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT * FROM messages
         WHERE sender_id = $1 OR recipient_id = $1
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}
