use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use lyceum_core::{trimmed_non_empty, CourseStatus, NotificationDraft};

use crate::error::ApiError;
use crate::fanout;
use crate::files::StoredFile;
use crate::models::{
    CourseListQuery, CourseRow, CourseView, CreateCourseRequest, DeleteCourseQuery,
    EnrolledStudentRow, EnrollRequest, MaterialRow, PersonView,
};
use crate::AppState;

pub(crate) async fn require_course(db: &PgPool, course_id: Uuid) -> Result<CourseRow, ApiError> {
    sqlx::query_as::<_, CourseRow>("SELECT * FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_optional(db)
        .await?
        .ok_or(ApiError::NotFound("Course"))
}

pub(crate) async fn require_student(db: &PgPool, student_id: Uuid) -> Result<Uuid, ApiError> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = $1 AND role = 'student'")
        .bind(student_id)
        .fetch_optional(db)
        .await?
        .ok_or(ApiError::NotFound("Student"))
}

pub(crate) async fn enrolled_student_ids(
    db: &PgPool,
    course_id: Uuid,
) -> Result<Vec<Uuid>, ApiError> {
    Ok(
        sqlx::query_scalar::<_, Uuid>("SELECT student_id FROM enrollments WHERE course_id = $1")
            .bind(course_id)
            .fetch_all(db)
            .await?,
    )
}

async fn load_rosters(
    db: &PgPool,
    course_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<PersonView>>, ApiError> {
    if course_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, EnrolledStudentRow>(
        "SELECT e.course_id, u.id, u.first_name, u.last_name
         FROM enrollments e
         JOIN users u ON u.id = e.student_id
         WHERE e.course_id = ANY($1)
         ORDER BY e.enrolled_at",
    )
    .bind(course_ids)
    .fetch_all(db)
    .await?;

    let mut by_course: HashMap<Uuid, Vec<PersonView>> = HashMap::new();
    for row in rows {
        by_course.entry(row.course_id).or_default().push(PersonView {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
        });
    }
    Ok(by_course)
}

async fn load_teachers(
    db: &PgPool,
    teacher_ids: &[Uuid],
) -> Result<HashMap<Uuid, PersonView>, ApiError> {
    if teacher_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, PersonView>(
        "SELECT id, first_name, last_name FROM users WHERE id = ANY($1)",
    )
    .bind(teacher_ids)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(|person| (person.id, person)).collect())
}

async fn assemble_views(db: &PgPool, rows: Vec<CourseRow>) -> Result<Vec<CourseView>, ApiError> {
    let course_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let mut teacher_ids: Vec<Uuid> = rows.iter().map(|row| row.teacher_id).collect();
    teacher_ids.sort_unstable();
    teacher_ids.dedup();

    let mut rosters = load_rosters(db, &course_ids).await?;
    let teachers = load_teachers(db, &teacher_ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let teacher = teachers.get(&row.teacher_id).cloned();
            let students = rosters.remove(&row.id).unwrap_or_default();
            CourseView::assemble(row, teacher, students)
        })
        .collect())
}

async fn assemble_one(db: &PgPool, row: CourseRow) -> Result<CourseView, ApiError> {
    let students = load_rosters(db, &[row.id])
        .await?
        .remove(&row.id)
        .unwrap_or_default();
    let teacher = load_teachers(db, &[row.teacher_id])
        .await?
        .remove(&row.teacher_id);
    Ok(CourseView::assemble(row, teacher, students))
}

// ── COURSE LIFECYCLE ────────────────────────────────────────────

pub async fn create_course(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut missing = Vec::new();
    for (name, value) in [
        ("title", &payload.title),
        ("code", &payload.code),
        ("description", &payload.description),
        ("category", &payload.category),
        ("difficulty", &payload.difficulty),
        ("duration", &payload.duration),
    ] {
        if trimmed_non_empty(value).is_none() {
            missing.push(name);
        }
    }
    if !missing.is_empty() {
        return Err(ApiError::MissingFields(missing.join(", ")));
    }

    let teacher = sqlx::query_as::<_, PersonView>(
        "SELECT id, first_name, last_name FROM users WHERE id = $1 AND role = 'teacher'",
    )
    .bind(payload.teacher_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("Teacher"))?;

    let code = payload.code.trim();
    let existing = sqlx::query_scalar::<_, Uuid>("SELECT id FROM courses WHERE code = $1")
        .bind(code)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Duplicate("Course code"));
    }

    let status = CourseStatus::from_publish_option(payload.publish_option.as_deref());
    let published_at = if status == CourseStatus::Published {
        Some(Utc::now())
    } else {
        None
    };

    let language = payload
        .language
        .as_deref()
        .and_then(trimmed_non_empty)
        .unwrap_or("english");

    let row = sqlx::query_as::<_, CourseRow>(
        "INSERT INTO courses (id, title, code, description, category, difficulty, duration,
                              language, price, max_students, prerequisites, learning_outcomes,
                              is_public, allow_discussions, status, teacher_id, published_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(payload.title.trim())
    .bind(code)
    .bind(payload.description.trim())
    .bind(payload.category.trim())
    .bind(payload.difficulty.trim())
    .bind(payload.duration.trim())
    .bind(language)
    .bind(payload.price.unwrap_or(0.0))
    .bind(payload.max_students)
    .bind(&payload.prerequisites)
    .bind(&payload.learning_outcomes)
    .bind(payload.is_public.unwrap_or(true))
    .bind(payload.allow_discussions.unwrap_or(true))
    .bind(status.as_str())
    .bind(teacher.id)
    .bind(published_at)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::conflict_on("Course code"))?;

    tracing::info!("Created course {} ({})", row.code, row.id);
    Ok((
        StatusCode::CREATED,
        Json(CourseView::assemble(row, Some(teacher), Vec::new())),
    ))
}

pub async fn list_courses(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CourseListQuery>,
) -> Result<Json<Vec<CourseView>>, ApiError> {
    let published_only = query.published.unwrap_or(false);
    let rows = match (query.code.as_deref().map(str::trim), published_only) {
        (Some(code), true) => {
            sqlx::query_as::<_, CourseRow>(
                "SELECT * FROM courses
                 WHERE code = $1 AND status = 'published' AND is_public = TRUE",
            )
            .bind(code)
            .fetch_all(&state.db)
            .await?
        }
        (Some(code), false) => {
            sqlx::query_as::<_, CourseRow>("SELECT * FROM courses WHERE code = $1")
                .bind(code)
                .fetch_all(&state.db)
                .await?
        }
        (None, true) => {
            sqlx::query_as::<_, CourseRow>(
                "SELECT * FROM courses
                 WHERE status = 'published' AND is_public = TRUE
                 ORDER BY created_at DESC",
            )
            .fetch_all(&state.db)
            .await?
        }
        (None, false) => {
            sqlx::query_as::<_, CourseRow>("SELECT * FROM courses ORDER BY created_at DESC")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(assemble_views(&state.db, rows).await?))
}

pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<CourseView>, ApiError> {
    let row = require_course(&state.db, course_id).await?;
    Ok(Json(assemble_one(&state.db, row).await?))
}

// Removing a course takes all its dependents with it in one transaction,
// so a failure partway leaves everything in place.
pub async fn delete_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
    Query(query): Query<DeleteCourseQuery>,
) -> Result<StatusCode, ApiError> {
    let course = require_course(&state.db, course_id).await?;
    if course.teacher_id != query.teacher_id {
        return Err(ApiError::Forbidden);
    }

    let mut tx = state.db.begin().await?;
    sqlx::query(
        "DELETE FROM submissions
         WHERE assignment_id IN (SELECT id FROM assignments WHERE course_id = $1)",
    )
    .bind(course_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM assignments WHERE course_id = $1")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM enrollments WHERE course_id = $1")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM course_materials WHERE course_id = $1")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM notifications WHERE course_id = $1")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!("Deleted course {} and its dependents", course_id);
    Ok(StatusCode::NO_CONTENT)
}

// ── ENROLLMENT ──────────────────────────────────────────────────

pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<EnrollRequest>,
) -> Result<Json<CourseView>, ApiError> {
    let course = require_course(&state.db, course_id).await?;
    let student_id = require_student(&state.db, payload.student_id).await?;

    // Capacity is checked before the membership write; under concurrency
    // the roster can briefly exceed the cap, which is accepted.
    if let Some(cap) = course.max_students {
        let enrolled: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE course_id = $1")
                .bind(course_id)
                .fetch_one(&state.db)
                .await?;
        if enrolled >= cap as i64 {
            return Err(ApiError::CourseFull);
        }
    }

    sqlx::query(
        "INSERT INTO enrollments (course_id, student_id) VALUES ($1, $2)
         ON CONFLICT DO NOTHING",
    )
    .bind(course_id)
    .bind(student_id)
    .execute(&state.db)
    .await?;

    tracing::info!("Enrolled student {} in course {}", student_id, course_id);
    let row = require_course(&state.db, course_id).await?;
    Ok(Json(assemble_one(&state.db, row).await?))
}

pub async fn unenroll(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<EnrollRequest>,
) -> Result<Json<CourseView>, ApiError> {
    let course = require_course(&state.db, course_id).await?;

    let result = sqlx::query("DELETE FROM enrollments WHERE course_id = $1 AND student_id = $2")
        .bind(course_id)
        .bind(payload.student_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() > 0 {
        tracing::info!(
            "Unenrolled student {} from course {}",
            payload.student_id,
            course_id
        );
    }
    Ok(Json(assemble_one(&state.db, course).await?))
}

pub async fn teacher_courses(
    State(state): State<Arc<AppState>>,
    Path(teacher_id): Path<Uuid>,
) -> Result<Json<Vec<CourseView>>, ApiError> {
    let rows = sqlx::query_as::<_, CourseRow>(
        "SELECT * FROM courses WHERE teacher_id = $1 ORDER BY created_at DESC",
    )
    .bind(teacher_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(assemble_views(&state.db, rows).await?))
}

pub async fn student_courses(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Vec<CourseView>>, ApiError> {
    let rows = sqlx::query_as::<_, CourseRow>(
        "SELECT c.* FROM courses c
         JOIN enrollments e ON e.course_id = c.id
         WHERE e.student_id = $1
         ORDER BY c.created_at DESC",
    )
    .bind(student_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(assemble_views(&state.db, rows).await?))
}

// ── COURSE MATERIALS ────────────────────────────────────────────

pub async fn upload_material(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let course = require_course(&state.db, course_id).await?;

    let mut stored: Vec<StoredFile> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::MalformedPayload)?
    {
        let Some(original) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|_| ApiError::MalformedPayload)?;
        stored.push(state.files.save(&original, &mime, &data).await?);
    }
    if stored.is_empty() {
        return Err(ApiError::MissingFields("materials".to_string()));
    }

    // Roster snapshot precedes the writes; once the batch commits, nothing
    // left on the fanout path can fail the request.
    let students = enrolled_student_ids(&state.db, course.id).await?;

    // The batch lands as one unit. now() is frozen for a whole transaction,
    // so the clock is bound per row to keep the listing in upload order.
    let mut tx = state.db.begin().await?;
    let mut rows = Vec::with_capacity(stored.len());
    for file in &stored {
        let row = sqlx::query_as::<_, MaterialRow>(
            "INSERT INTO course_materials (id, course_id, file_name, original_name,
                                           storage_path, mime_type, size, upload_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(course.id)
        .bind(&file.file_name)
        .bind(&file.original_name)
        .bind(&file.storage_path)
        .bind(&file.mime_type)
        .bind(file.size)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        rows.push(row);
    }
    tx.commit().await?;

    let mut drafts = Vec::new();
    for row in &rows {
        drafts.extend(NotificationDraft::material_uploaded(
            course.id,
            &row.original_name,
            &students,
        ));
    }
    fanout::persist(&state.db, &drafts).await;

    tracing::info!("Uploaded {} material(s) to course {}", rows.len(), course.id);
    Ok((StatusCode::CREATED, Json(rows)))
}

pub async fn list_materials(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<MaterialRow>>, ApiError> {
    let course = require_course(&state.db, course_id).await?;
    let rows = sqlx::query_as::<_, MaterialRow>(
        "SELECT * FROM course_materials WHERE course_id = $1 ORDER BY upload_date, id",
    )
    .bind(course.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}
