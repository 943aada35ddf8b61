use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use lyceum_core::{trimmed_non_empty, NotificationDraft};

use crate::error::ApiError;
use crate::fanout;
use crate::handlers::courses::{enrolled_student_ids, require_course, require_student};
use crate::models::{
    AssignmentRow, CourseRow, CreateAssignmentRequest, GradeRequest, SubmissionListRow,
    SubmissionRow, SubmissionView,
};
use crate::AppState;

pub async fn create_assignment(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<CreateAssignmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let course = require_course(&state.db, course_id).await?;
    let title =
        trimmed_non_empty(&payload.title).ok_or(ApiError::MissingFields("title".to_string()))?;

    // Roster snapshot precedes the insert; once the assignment commits,
    // nothing left on the fanout path can fail the request.
    let students = enrolled_student_ids(&state.db, course.id).await?;

    let row = sqlx::query_as::<_, AssignmentRow>(
        "INSERT INTO assignments (id, course_id, title, description, due_date, points)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(course.id)
    .bind(title)
    .bind(&payload.description)
    .bind(payload.due_date)
    .bind(payload.points.unwrap_or(100))
    .fetch_one(&state.db)
    .await?;

    let drafts = NotificationDraft::assignment_created(course.id, &row.title, &students);
    fanout::persist(&state.db, &drafts).await;

    tracing::info!("Created assignment {} in course {}", row.id, course.id);
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn list_assignments(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<AssignmentRow>>, ApiError> {
    let rows = sqlx::query_as::<_, AssignmentRow>(
        "SELECT * FROM assignments WHERE course_id = $1 ORDER BY created_at",
    )
    .bind(course_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

pub async fn get_assignment(
    State(state): State<Arc<AppState>>,
    Path(assignment_id): Path<Uuid>,
) -> Result<Json<AssignmentRow>, ApiError> {
    let row = sqlx::query_as::<_, AssignmentRow>("SELECT * FROM assignments WHERE id = $1")
        .bind(assignment_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Assignment"))?;
    Ok(Json(row))
}

// A student has at most one submission per assignment; submitting again
// replaces the stored file and refreshes the timestamp. The unique index
// on (assignment_id, student_id) makes the upsert safe under racing
// first submissions.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path(assignment_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SubmissionRow>, ApiError> {
    let assignment =
        sqlx::query_as::<_, AssignmentRow>("SELECT * FROM assignments WHERE id = $1")
            .bind(assignment_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(ApiError::NotFound("Assignment"))?;

    let mut student_id: Option<Uuid> = None;
    let mut upload: Option<(String, String, axum::body::Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::MalformedPayload)?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("student_id") => {
                let text = field.text().await.map_err(|_| ApiError::MalformedPayload)?;
                student_id = Some(text.trim().parse().map_err(|_| ApiError::MalformedPayload)?);
            }
            Some("file") => {
                let original = field.file_name().unwrap_or("upload").to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::MalformedPayload)?;
                upload = Some((original, mime, data));
            }
            _ => {}
        }
    }
    let student_id = student_id.ok_or(ApiError::MissingFields("student_id".to_string()))?;
    let (original, mime, data) = upload.ok_or(ApiError::MissingFields("file".to_string()))?;

    let student_id = require_student(&state.db, student_id).await?;
    let file = state.files.save(&original, &mime, &data).await?;

    // A resubmission is an update, not a new event; only a first-time
    // submission notifies the teacher.
    let existing = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM submissions WHERE assignment_id = $1 AND student_id = $2",
    )
    .bind(assignment.id)
    .bind(student_id)
    .fetch_optional(&state.db)
    .await?;

    let row = sqlx::query_as::<_, SubmissionRow>(
        "INSERT INTO submissions (id, assignment_id, student_id, file_name, original_name)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (assignment_id, student_id) DO UPDATE SET
             file_name = excluded.file_name,
             original_name = excluded.original_name,
             submitted_at = now()
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(assignment.id)
    .bind(student_id)
    .bind(&file.file_name)
    .bind(&file.original_name)
    .fetch_one(&state.db)
    .await?;

    if existing.is_none() {
        let course = sqlx::query_as::<_, CourseRow>("SELECT * FROM courses WHERE id = $1")
            .bind(assignment.course_id)
            .fetch_optional(&state.db)
            .await
            .ok()
            .flatten();
        if let Some(course) = course {
            let draft = NotificationDraft::submission_received(
                course.id,
                course.teacher_id,
                &assignment.title,
            );
            fanout::persist(&state.db, &[draft]).await;
        }
    }

    tracing::info!(
        "Stored submission {} for assignment {}",
        row.id,
        assignment.id
    );
    Ok(Json(row))
}

pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Path(assignment_id): Path<Uuid>,
) -> Result<Json<Vec<SubmissionView>>, ApiError> {
    let rows = sqlx::query_as::<_, SubmissionListRow>(
        "SELECT s.id, s.assignment_id, s.student_id, s.file_name, s.original_name,
                s.submitted_at, s.grade, s.feedback, u.first_name, u.last_name
         FROM submissions s
         JOIN users u ON u.id = s.student_id
         WHERE s.assignment_id = $1
         ORDER BY s.submitted_at DESC",
    )
    .bind(assignment_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows.into_iter().map(SubmissionView::from).collect()))
}

pub async fn grade_submission(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<Uuid>,
    Json(payload): Json<GradeRequest>,
) -> Result<Json<SubmissionRow>, ApiError> {
    let row = sqlx::query_as::<_, SubmissionRow>(
        "UPDATE submissions SET grade = $2, feedback = $3 WHERE id = $1 RETURNING *",
    )
    .bind(submission_id)
    .bind(payload.grade)
    .bind(&payload.feedback)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("Submission"))?;

    let assignment = sqlx::query_as::<_, AssignmentRow>("SELECT * FROM assignments WHERE id = $1")
        .bind(row.assignment_id)
        .fetch_optional(&state.db)
        .await
        .ok()
        .flatten();
    if let Some(assignment) = assignment {
        let draft =
            NotificationDraft::grade_posted(assignment.course_id, row.student_id, &assignment.title);
        fanout::persist(&state.db, &[draft]).await;
    }

    tracing::info!("Graded submission {}", row.id);
    Ok(Json(row))
}
