use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub institution: Option<String>,
    pub major: Option<String>,
    pub year_level: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub experience: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PersonView {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct CourseRow {
    pub id: Uuid,
    pub title: String,
    pub code: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    pub duration: String,
    pub language: String,
    pub price: f64,
    pub max_students: Option<i32>,
    pub prerequisites: Option<String>,
    pub learning_outcomes: Option<Vec<String>>,
    pub is_public: bool,
    pub allow_discussions: bool,
    pub status: String,
    pub teacher_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct AssignmentRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub points: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubmissionRow {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    pub file_name: String,
    pub original_name: String,
    pub submitted_at: DateTime<Utc>,
    pub grade: Option<i32>,
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: String,
    pub recipient_id: Uuid,
    pub recipient_role: String,
    pub subject: Option<String>,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_role: String,
    pub message: String,
    pub course_id: Option<Uuid>,
    pub kind: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct MaterialRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub file_name: String,
    pub original_name: String,
    pub storage_path: String,
    pub mime_type: String,
    pub size: i64,
    pub upload_date: DateTime<Utc>,
}

// ── Derived views ───────────────────────────────────────────────

// Account as returned to clients; never carries the password hash or the
// pending OTP state.
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub id: Uuid,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for ProfileView {
    fn from(row: UserRow) -> Self {
        ProfileView {
            id: row.id,
            role: row.role,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            institution: row.institution,
            major: row.major,
            year_level: row.year_level,
            department: row.department,
            position: row.position,
            experience: row.experience,
            subjects: row.subjects,
            bio: row.bio,
            profile_picture: row.profile_picture,
            created_at: row.created_at,
        }
    }
}

// Course with its teacher and roster resolved to names.
#[derive(Debug, Serialize)]
pub struct CourseView {
    pub id: Uuid,
    pub title: String,
    pub code: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    pub duration: String,
    pub language: String,
    pub price: f64,
    pub max_students: Option<i32>,
    pub prerequisites: Option<String>,
    pub learning_outcomes: Option<Vec<String>>,
    pub is_public: bool,
    pub allow_discussions: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub teacher: Option<PersonView>,
    pub students: Vec<PersonView>,
}

impl CourseView {
    pub fn assemble(row: CourseRow, teacher: Option<PersonView>, students: Vec<PersonView>) -> Self {
        CourseView {
            id: row.id,
            title: row.title,
            code: row.code,
            description: row.description,
            category: row.category,
            difficulty: row.difficulty,
            duration: row.duration,
            language: row.language,
            price: row.price,
            max_students: row.max_students,
            prerequisites: row.prerequisites,
            learning_outcomes: row.learning_outcomes,
            is_public: row.is_public,
            allow_discussions: row.allow_discussions,
            status: row.status,
            created_at: row.created_at,
            published_at: row.published_at,
            teacher,
            students,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct EnrolledStudentRow {
    pub course_id: Uuid,
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SubmissionListRow {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    pub file_name: String,
    pub original_name: String,
    pub submitted_at: DateTime<Utc>,
    pub grade: Option<i32>,
    pub feedback: Option<String>,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
pub struct SubmissionView {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub student: PersonView,
    pub file_name: String,
    pub original_name: String,
    pub submitted_at: DateTime<Utc>,
    pub grade: Option<i32>,
    pub feedback: Option<String>,
}

impl From<SubmissionListRow> for SubmissionView {
    fn from(row: SubmissionListRow) -> Self {
        SubmissionView {
            id: row.id,
            assignment_id: row.assignment_id,
            student: PersonView {
                id: row.student_id,
                first_name: row.first_name,
                last_name: row.last_name,
            },
            file_name: row.file_name,
            original_name: row.original_name,
            submitted_at: row.submitted_at,
            grade: row.grade,
            feedback: row.feedback,
        }
    }
}

// ── API Payloads ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub institution: Option<String>,
    pub major: Option<String>,
    pub year_level: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub experience: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: ProfileView,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub user_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub institution: Option<String>,
    pub major: Option<String>,
    pub year_level: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub experience: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    pub teacher_id: Uuid,
    pub title: String,
    pub code: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    pub duration: String,
    pub language: Option<String>,
    pub price: Option<f64>,
    pub max_students: Option<i32>,
    pub prerequisites: Option<String>,
    pub learning_outcomes: Option<Vec<String>>,
    pub is_public: Option<bool>,
    pub allow_discussions: Option<bool>,
    pub publish_option: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CourseListQuery {
    pub code: Option<String>,
    pub published: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteCourseQuery {
    pub teacher_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub student_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CreateAssignmentRequest {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub points: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub grade: i32,
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender_id: Uuid,
    pub sender_role: String,
    pub recipient_id: Uuid,
    pub recipient_role: String,
    pub subject: Option<String>,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequestBody {
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetVerifyBody {
    pub identifier: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirmBody {
    pub identifier: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub exp: usize,
}
