pub mod assignments;
pub mod auth;
pub mod courses;
pub mod messages;
pub mod notifications;
pub mod profile;
pub mod reset;
