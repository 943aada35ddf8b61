use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub const OTP_DIGITS: usize = 6;
pub const OTP_TTL_MINUTES: i64 = 10;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized {0}: {1}")]
pub struct UnknownVariant(pub &'static str, pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            other => Err(UnknownVariant("role", other.to_string())),
        }
    }
}

// Course lifecycle only moves forward: draft -> published -> archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

impl CourseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CourseStatus::Draft => "draft",
            CourseStatus::Published => "published",
            CourseStatus::Archived => "archived",
        }
    }

    fn rank(self) -> u8 {
        match self {
            CourseStatus::Draft => 0,
            CourseStatus::Published => 1,
            CourseStatus::Archived => 2,
        }
    }

    pub fn can_advance_to(self, next: CourseStatus) -> bool {
        next.rank() >= self.rank()
    }

    pub fn from_publish_option(option: Option<&str>) -> CourseStatus {
        match option {
            Some("publish") => CourseStatus::Published,
            _ => CourseStatus::Draft,
        }
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(CourseStatus::Draft),
            "published" => Ok(CourseStatus::Published),
            "archived" => Ok(CourseStatus::Archived),
            other => Err(UnknownVariant("course status", other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Assignment,
    Material,
    Grade,
    Message,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Assignment => "assignment",
            NotificationKind::Material => "material",
            NotificationKind::Grade => "grade",
            NotificationKind::Message => "message",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assignment" => Ok(NotificationKind::Assignment),
            "material" => Ok(NotificationKind::Material),
            "grade" => Ok(NotificationKind::Grade),
            "message" => Ok(NotificationKind::Message),
            other => Err(UnknownVariant("notification kind", other.to_string())),
        }
    }
}

// A notification that has been derived from a domain event but not yet
// written to the store. Fanout writes happen after the primary record
// commits and each one is allowed to fail independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDraft {
    pub user_id: Uuid,
    pub user_role: Role,
    pub message: String,
    pub course_id: Option<Uuid>,
    pub kind: NotificationKind,
}

impl NotificationDraft {
    pub fn assignment_created(course_id: Uuid, title: &str, students: &[Uuid]) -> Vec<Self> {
        students
            .iter()
            .map(|student_id| NotificationDraft {
                user_id: *student_id,
                user_role: Role::Student,
                message: format!("New assignment: {title}"),
                course_id: Some(course_id),
                kind: NotificationKind::Assignment,
            })
            .collect()
    }

    pub fn material_uploaded(course_id: Uuid, original_name: &str, students: &[Uuid]) -> Vec<Self> {
        students
            .iter()
            .map(|student_id| NotificationDraft {
                user_id: *student_id,
                user_role: Role::Student,
                message: format!("New material: {original_name}"),
                course_id: Some(course_id),
                kind: NotificationKind::Material,
            })
            .collect()
    }

    pub fn submission_received(course_id: Uuid, teacher_id: Uuid, assignment_title: &str) -> Self {
        NotificationDraft {
            user_id: teacher_id,
            user_role: Role::Teacher,
            message: format!("New submission for: {assignment_title}"),
            course_id: Some(course_id),
            kind: NotificationKind::Assignment,
        }
    }

    pub fn grade_posted(course_id: Uuid, student_id: Uuid, assignment_title: &str) -> Self {
        NotificationDraft {
            user_id: student_id,
            user_role: Role::Student,
            message: format!("Grade posted for: {assignment_title}"),
            course_id: Some(course_id),
            kind: NotificationKind::Grade,
        }
    }

    pub fn message_received(recipient_id: Uuid, recipient_role: Role, subject: Option<&str>) -> Self {
        let subject = match subject {
            Some(s) if !s.trim().is_empty() => s.trim(),
            _ => "No subject",
        };
        NotificationDraft {
            user_id: recipient_id,
            user_role: recipient_role,
            message: format!("New message: {subject}"),
            course_id: None,
            kind: NotificationKind::Message,
        }
    }
}

// One reset challenge per account; issuing a new one replaces the old.
// Verification is non-destructive so the same code can be checked and
// then redeemed by the confirm step within the validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub fn issue(now: DateTime<Utc>) -> Self {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        OtpChallenge {
            code,
            expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
        }
    }

    pub fn accepts(&self, code: &str, now: DateTime<Utc>) -> bool {
        self.code == code && now <= self.expires_at
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn is_reasonable_email(email: &str) -> bool {
    if email.len() < 5 || email.len() > 254 {
        return false;
    }
    let mut parts = email.split('@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    parts.next().is_none()
        && !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

pub fn trimmed_non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

pub fn is_acceptable_password(password: &str) -> bool {
    (MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password.len())
}
