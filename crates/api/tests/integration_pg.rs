// ═══════════════════════════════════════════════════════════════
// Lyceum — Live PostgreSQL Integration Tests
// Enrollment capacity · Submission upsert · Fanout · OTP reset
//
// These drive the real router against a disposable database:
//   DATABASE_URL=postgres://... cargo test -p lyceum-api -- --ignored
// ═══════════════════════════════════════════════════════════════

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use lyceum_api::delivery::LoggedDelivery;
use lyceum_api::files::FileStore;
use lyceum_api::{router, AppState};

async fn test_state() -> Arc<AppState> {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must point at a disposable test database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");

    Arc::new(AppState {
        db: pool,
        jwt_secret: "integration-test-secret".to_string(),
        token_ttl_days: 1,
        files: FileStore::new(std::env::temp_dir().join("lyceum-it-uploads")),
        delivery: Arc::new(LoggedDelivery),
    })
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("response");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn send_multipart(app: &Router, uri: &str, body: Vec<u8>, boundary: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

// (field name, optional file name, content type, payload)
fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, content_type, data) in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match file_name {
            Some(fname) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{fname}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

fn unique_code(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

async fn register(app: &Router, role: &str, first: &str, email: &str) -> Uuid {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/register",
        Some(json!({
            "role": role,
            "first_name": first,
            "last_name": "Tester",
            "email": email,
            "password": "hunter2hunter2",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body["user"]["id"]
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
        .expect("user id in register response")
}

async fn create_course(app: &Router, teacher_id: Uuid, max_students: Option<i32>) -> Uuid {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/courses",
        Some(json!({
            "teacher_id": teacher_id,
            "title": "Intro to Systems",
            "code": unique_code("CS"),
            "description": "Foundations",
            "category": "computing",
            "difficulty": "beginner",
            "duration": "12 weeks",
            "max_students": max_students,
            "publish_option": "publish",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create course failed: {body}");
    body["id"]
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
        .expect("course id")
}

async fn create_assignment(app: &Router, course_id: Uuid, title: &str) -> Uuid {
    let (status, body) = send(
        app,
        Method::POST,
        &format!("/api/courses/{course_id}/assignments"),
        Some(json!({ "title": title })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create assignment failed: {body}");
    body["id"]
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
        .expect("assignment id")
}

async fn submit_file(
    app: &Router,
    assignment_id: Uuid,
    student_id: Uuid,
    file_name: &str,
) -> (StatusCode, Value) {
    let boundary = "lyceum-test-boundary";
    let student = student_id.to_string();
    let body = multipart_body(
        boundary,
        &[
            ("student_id", None, "", student.as_bytes()),
            ("file", Some(file_name), "application/pdf", b"solution bytes"),
        ],
    );
    send_multipart(
        app,
        &format!("/api/assignments/{assignment_id}/submit"),
        body,
        boundary,
    )
    .await
}

async fn notifications_for(app: &Router, role: &str, user_id: Uuid) -> Vec<Value> {
    let (status, body) = send(
        app,
        Method::GET,
        &format!("/api/notifications/{role}/{user_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body.as_array().expect("notification array").clone()
}

#[tokio::test]
#[ignore]
async fn duplicate_registration_is_rejected_case_insensitively() {
    let state = test_state().await;
    let app = router(state);

    let email = unique_email("ada");
    register(&app, "student", "Ada", &email).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/register",
        Some(json!({
            "role": "teacher",
            "first_name": "Ada",
            "last_name": "Tester",
            "email": email.to_uppercase(),
            "password": "hunter2hunter2",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "expected duplicate: {body}");
    assert_eq!(body["error"], "duplicate_key");
    assert_eq!(body["message"], "Account already exists");
}

#[tokio::test]
#[ignore]
async fn login_requires_matching_role_and_password() {
    let state = test_state().await;
    let app = router(state);

    let email = unique_email("grace");
    let teacher_id = register(&app, "teacher", "Grace", &email).await;

    // Same email, wrong role.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/login",
        Some(json!({ "email": email, "password": "hunter2hunter2", "role": "student" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/login",
        Some(json!({ "email": email, "password": "not-the-password", "role": "teacher" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/login",
        Some(json!({ "email": email, "password": "hunter2hunter2", "role": "teacher" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().expect("token").to_string();
    assert_eq!(body["user"]["id"], teacher_id.to_string());

    // The token resolves back to the same account.
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/session")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let session: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(session["id"], teacher_id.to_string());
    assert!(session.get("password_hash").is_none());
}

#[tokio::test]
#[ignore]
async fn enrollment_honors_capacity_and_is_idempotent() {
    let state = test_state().await;
    let app = router(state);

    let teacher = register(&app, "teacher", "Turing", &unique_email("turing")).await;
    let s1 = register(&app, "student", "One", &unique_email("s1")).await;
    let s2 = register(&app, "student", "Two", &unique_email("s2")).await;
    let s3 = register(&app, "student", "Three", &unique_email("s3")).await;
    let course = create_course(&app, teacher, Some(2)).await;

    let enroll = |student: Uuid| {
        let app = app.clone();
        async move {
            send(
                &app,
                Method::POST,
                &format!("/api/courses/{course}/enroll"),
                Some(json!({ "student_id": student })),
            )
            .await
        }
    };

    let (status, _) = enroll(s1).await;
    assert_eq!(status, StatusCode::OK);

    // Enrolling the same student again is a no-op, not an error.
    let (status, body) = enroll(s1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["students"].as_array().expect("roster").len(), 1);

    let (status, body) = enroll(s2).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["students"].as_array().expect("roster").len(), 2);

    // Cap reached.
    let (status, body) = enroll(s3).await;
    assert_eq!(status, StatusCode::CONFLICT, "expected full: {body}");
    assert_eq!(body["error"], "course_full");

    // Unenrolling someone who was never enrolled is a no-op.
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/courses/{course}/unenroll"),
        Some(json!({ "student_id": s3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["students"].as_array().expect("roster").len(), 2);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/courses/{course}/unenroll"),
        Some(json!({ "student_id": s1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let roster = body["students"].as_array().expect("roster");
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0]["id"], s2.to_string());

    // Enrollment shows up in the student's own course list.
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/students/{s2}/courses"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().expect("course list");
    assert!(listed.iter().any(|c| c["id"] == course.to_string()));
}

#[tokio::test]
#[ignore]
async fn resubmission_replaces_the_file_and_keeps_one_row() {
    let state = test_state().await;
    let app = router(state);

    let teacher = register(&app, "teacher", "Knuth", &unique_email("knuth")).await;
    let student = register(&app, "student", "Leslie", &unique_email("leslie")).await;
    let course = create_course(&app, teacher, None).await;
    send(
        &app,
        Method::POST,
        &format!("/api/courses/{course}/enroll"),
        Some(json!({ "student_id": student })),
    )
    .await;
    let assignment = create_assignment(&app, course, "Lab 2").await;

    let (status, first) = submit_file(&app, assignment, student, "draft.pdf").await;
    assert_eq!(status, StatusCode::OK, "first submit failed: {first}");

    // The teacher hears about the submission.
    let teacher_notes = notifications_for(&app, "teacher", teacher).await;
    assert!(teacher_notes
        .iter()
        .any(|n| n["message"] == "New submission for: Lab 2"));

    // Grade it, then resubmit.
    let submission_id = first["id"].as_str().expect("submission id").to_string();
    let (status, graded) = send(
        &app,
        Method::PUT,
        &format!("/api/submissions/{submission_id}/grade"),
        Some(json!({ "grade": 85, "feedback": "solid" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graded["grade"], 85);

    let (status, second) = submit_file(&app, assignment, student, "final.pdf").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["id"], first["id"], "resubmission must reuse the row");

    // An overwrite is not a new event; the teacher is told once.
    let teacher_notes = notifications_for(&app, "teacher", teacher).await;
    let submission_notes = teacher_notes
        .iter()
        .filter(|n| n["message"] == "New submission for: Lab 2")
        .count();
    assert_eq!(submission_notes, 1);

    let (status, listed) = send(
        &app,
        Method::GET,
        &format!("/api/assignments/{assignment}/submissions"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().expect("submission list");
    assert_eq!(listed.len(), 1, "one submission per student per assignment");
    assert_eq!(listed[0]["original_name"], "final.pdf");
    assert_eq!(listed[0]["grade"], 85);
    assert_eq!(listed[0]["student"]["id"], student.to_string());

    // Grade fanout reached the student.
    let student_notes = notifications_for(&app, "student", student).await;
    assert!(student_notes
        .iter()
        .any(|n| n["message"] == "Grade posted for: Lab 2" && n["kind"] == "grade"));
}

#[tokio::test]
#[ignore]
async fn assignment_fanout_reaches_exactly_the_enrolled_students() {
    let state = test_state().await;
    let app = router(state);

    let teacher = register(&app, "teacher", "Barbara", &unique_email("barbara")).await;
    let s1 = register(&app, "student", "One", &unique_email("f1")).await;
    let s2 = register(&app, "student", "Two", &unique_email("f2")).await;
    let outsider = register(&app, "student", "Out", &unique_email("f3")).await;
    let course = create_course(&app, teacher, None).await;

    for student in [s1, s2] {
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/courses/{course}/enroll"),
            Some(json!({ "student_id": student })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    create_assignment(&app, course, "Problem Set 1").await;

    for student in [s1, s2] {
        let notes = notifications_for(&app, "student", student).await;
        let matching: Vec<_> = notes
            .iter()
            .filter(|n| n["message"] == "New assignment: Problem Set 1")
            .collect();
        assert_eq!(matching.len(), 1, "exactly one notification per student");
        assert_eq!(matching[0]["kind"], "assignment");
        assert_eq!(matching[0]["read"], false);
        assert_eq!(matching[0]["course_id"], course.to_string());
    }

    let outsider_notes = notifications_for(&app, "student", outsider).await;
    assert!(outsider_notes.is_empty(), "no fanout to non-enrolled students");

    // Marking one read is idempotent.
    let notes = notifications_for(&app, "student", s1).await;
    let id = notes[0]["id"].as_str().expect("notification id").to_string();
    for _ in 0..2 {
        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/notifications/{id}/read"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["read"], true);
    }
}

#[tokio::test]
#[ignore]
async fn assignment_fanout_snapshots_the_roster_at_creation() {
    let state = test_state().await;
    let app = router(state);

    let teacher = register(&app, "teacher", "Ina", &unique_email("ina")).await;
    let early = register(&app, "student", "Early", &unique_email("early")).await;
    let late = register(&app, "student", "Late", &unique_email("late")).await;
    let course = create_course(&app, teacher, None).await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/courses/{course}/enroll"),
        Some(json!({ "student_id": early })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let assignment = create_assignment(&app, course, "Reading 1").await;

    // A student joining afterwards is not notified retroactively.
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/courses/{course}/enroll"),
        Some(json!({ "student_id": late })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let early_notes = notifications_for(&app, "student", early).await;
    let matching = early_notes
        .iter()
        .filter(|n| n["message"] == "New assignment: Reading 1")
        .count();
    assert_eq!(matching, 1, "at-creation roster is notified exactly once");

    let late_notes = notifications_for(&app, "student", late).await;
    assert!(
        late_notes
            .iter()
            .all(|n| n["message"] != "New assignment: Reading 1"),
        "late enrollee sees no assignment fanout"
    );

    // The assignment itself committed regardless of the fanout targets.
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/assignments/{assignment}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Reading 1");
}

#[tokio::test]
#[ignore]
async fn material_upload_notifies_the_roster() {
    let state = test_state().await;
    let app = router(state);

    let teacher = register(&app, "teacher", "Mary", &unique_email("mary")).await;
    let student = register(&app, "student", "Pat", &unique_email("pat")).await;
    let course = create_course(&app, teacher, None).await;
    send(
        &app,
        Method::POST,
        &format!("/api/courses/{course}/enroll"),
        Some(json!({ "student_id": student })),
    )
    .await;

    // Unknown course refuses the upload.
    let boundary = "lyceum-material-boundary";
    let body = multipart_body(
        boundary,
        &[
            ("materials", Some("week1.pdf"), "application/pdf", b"slides"),
            ("materials", Some("week1-notes.txt"), "text/plain", b"reading list"),
        ],
    );
    let (status, _) = send_multipart(
        &app,
        &format!("/api/courses/{}/materials", Uuid::new_v4()),
        body.clone(),
        boundary,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The whole batch lands together, in request order.
    let (status, uploaded) = send_multipart(
        &app,
        &format!("/api/courses/{course}/materials"),
        body,
        boundary,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "upload failed: {uploaded}");
    let uploaded = uploaded.as_array().expect("materials");
    assert_eq!(uploaded.len(), 2);
    assert_eq!(uploaded[0]["original_name"], "week1.pdf");
    assert_eq!(uploaded[1]["original_name"], "week1-notes.txt");

    let (status, listed) = send(
        &app,
        Method::GET,
        &format!("/api/courses/{course}/materials"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().expect("material list");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["original_name"], "week1.pdf");
    assert_eq!(listed[1]["original_name"], "week1-notes.txt");

    // One notification per file reaches the enrolled student.
    let notes = notifications_for(&app, "student", student).await;
    for name in ["week1.pdf", "week1-notes.txt"] {
        let matching = notes
            .iter()
            .filter(|n| n["message"] == format!("New material: {name}") && n["kind"] == "material")
            .count();
        assert_eq!(matching, 1, "one material notification for {name}");
    }
}

#[tokio::test]
#[ignore]
async fn message_lands_in_both_mailboxes_and_notifies_the_recipient() {
    let state = test_state().await;
    let app = router(state);

    let teacher = register(&app, "teacher", "Edsger", &unique_email("edsger")).await;
    let student = register(&app, "student", "Tony", &unique_email("tony")).await;

    // Blank content is refused.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/messages",
        Some(json!({
            "sender_id": student,
            "sender_role": "student",
            "recipient_id": teacher,
            "recipient_role": "teacher",
            "subject": "Office hours",
            "content": "   ",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, sent) = send(
        &app,
        Method::POST,
        "/api/messages",
        Some(json!({
            "sender_id": student,
            "sender_role": "student",
            "recipient_id": teacher,
            "recipient_role": "teacher",
            "subject": "Office hours",
            "content": "When are they this week?",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["read"], false);

    for mailbox in [student, teacher] {
        let (status, listed) = send(
            &app,
            Method::GET,
            &format!("/api/messages/{mailbox}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(listed
            .as_array()
            .expect("mailbox")
            .iter()
            .any(|m| m["id"] == sent["id"]));
    }

    let notes = notifications_for(&app, "teacher", teacher).await;
    assert!(notes
        .iter()
        .any(|n| n["message"] == "New message: Office hours" && n["kind"] == "message"));
}

#[tokio::test]
#[ignore]
async fn deleting_a_course_removes_every_dependent_record() {
    let state = test_state().await;
    let app = router(state.clone());

    let teacher = register(&app, "teacher", "Nik", &unique_email("nik")).await;
    let student = register(&app, "student", "Bj", &unique_email("bj")).await;
    let classmate = register(&app, "student", "Dennis", &unique_email("dmr")).await;
    let course = create_course(&app, teacher, None).await;
    for enrollee in [student, classmate] {
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/courses/{course}/enroll"),
            Some(json!({ "student_id": enrollee })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let assignment = create_assignment(&app, course, "Final Project").await;
    let (status, _) = submit_file(&app, assignment, student, "project.zip").await;
    assert_eq!(status, StatusCode::OK);

    // The wrong teacher cannot delete it.
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/courses/{course}?teacher_id={}", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/courses/{course}?teacher_id={teacher}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &format!("/api/courses/{course}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/assignments/{assignment}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Every derived course list is empty again.
    for enrollee in [student, classmate] {
        let (_, courses) = send(
            &app,
            Method::GET,
            &format!("/api/students/{enrollee}/courses"),
            None,
        )
        .await;
        assert!(courses.as_array().expect("course list").is_empty());
    }
    let (_, courses) = send(
        &app,
        Method::GET,
        &format!("/api/teachers/{teacher}/courses"),
        None,
    )
    .await;
    assert!(courses.as_array().expect("course list").is_empty());

    // Course-scoped notifications are gone with the course.
    let remaining: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE course_id = $1")
            .bind(course)
            .fetch_one(&state.db)
            .await
            .expect("count");
    assert_eq!(remaining, 0);
    let submissions: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM submissions WHERE assignment_id = $1",
    )
    .bind(assignment)
    .fetch_one(&state.db)
    .await
    .expect("count");
    assert_eq!(submissions, 0);
}

#[tokio::test]
#[ignore]
async fn password_reset_verifies_then_redeems_a_single_challenge() {
    let state = test_state().await;
    let app = router(state.clone());

    let email = unique_email("reset");
    let user_id = register(&app, "student", "Rita", &email).await;

    // Unknown identifiers get the same answer as known ones.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/password-reset/request",
        Some(json!({ "identifier": unique_email("ghost") })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let generic = body["message"].clone();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/password-reset/request",
        Some(json!({ "identifier": email })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], generic);

    // The code is not exposed over HTTP; fish it out of the store.
    let code: Option<String> = sqlx::query_scalar("SELECT otp_code FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&state.db)
        .await
        .expect("otp lookup");
    let code = code.expect("a challenge was stored");
    assert_eq!(code.len(), 6);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/password-reset/verify",
        Some(json!({ "identifier": email, "otp": "000000x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Verification does not consume the challenge.
    for _ in 0..2 {
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/password-reset/verify",
            Some(json!({ "identifier": email, "otp": code })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);
    }

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/password-reset/confirm",
        Some(json!({ "identifier": email, "otp": code, "new_password": "a-brand-new-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Old password is dead, new one works.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/login",
        Some(json!({ "email": email, "password": "hunter2hunter2", "role": "student" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/login",
        Some(json!({ "email": email, "password": "a-brand-new-pass", "role": "student" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Confirm cleared the challenge; the code cannot be redeemed twice.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/password-reset/confirm",
        Some(json!({ "identifier": email, "otp": code, "new_password": "another-new-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn course_code_collisions_are_conflicts() {
    let state = test_state().await;
    let app = router(state);

    let teacher = register(&app, "teacher", "Ada", &unique_email("codes")).await;
    let code = unique_code("CS");
    let payload = |code: &str| {
        json!({
            "teacher_id": teacher,
            "title": "Networks",
            "code": code,
            "description": "Packets",
            "category": "computing",
            "difficulty": "intermediate",
            "duration": "8 weeks",
        })
    };

    let (status, _) = send(&app, Method::POST, "/api/courses", Some(payload(&code))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::POST, "/api/courses", Some(payload(&code))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_key");
    assert_eq!(body["message"], "Course code already exists");

    // Missing required fields are reported together.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/courses",
        Some(json!({
            "teacher_id": teacher,
            "title": " ",
            "code": unique_code("CS"),
            "description": "",
            "category": "computing",
            "difficulty": "beginner",
            "duration": "6 weeks",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_fields");
    assert_eq!(body["message"], "Missing or invalid fields: title, description");
}

#[tokio::test]
#[ignore]
async fn a_single_seat_course_admits_exactly_one_student() {
    let state = test_state().await;
    let app = router(state);

    let teacher = register(&app, "teacher", "Solo", &unique_email("solo")).await;
    let s1 = register(&app, "student", "First", &unique_email("seat1")).await;
    let s2 = register(&app, "student", "Second", &unique_email("seat2")).await;
    let course = create_course(&app, teacher, Some(1)).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/courses/{course}/enroll"),
        Some(json!({ "student_id": s1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let roster = body["students"].as_array().expect("roster");
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0]["id"], s1.to_string());

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/courses/{course}/enroll"),
        Some(json!({ "student_id": s2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "course_full");
}
