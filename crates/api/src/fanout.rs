use lyceum_core::NotificationDraft;
use sqlx::PgPool;
use uuid::Uuid;

// Best-effort notification writes, always after the primary record has
// committed. Each insert fails independently; a dropped notification is
// logged and never bubbles up to the caller.
pub async fn persist(db: &PgPool, drafts: &[NotificationDraft]) {
    for draft in drafts {
        let result = sqlx::query(
            "INSERT INTO notifications (id, user_id, user_role, message, course_id, kind)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(draft.user_id)
        .bind(draft.user_role.as_str())
        .bind(&draft.message)
        .bind(draft.course_id)
        .bind(draft.kind.as_str())
        .execute(db)
        .await;

        if let Err(err) = result {
            tracing::warn!(
                "dropped {} notification for user {}: {err}",
                draft.kind,
                draft.user_id
            );
        }
    }
}
