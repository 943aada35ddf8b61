use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::str::FromStr;
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use lyceum_core::{
    is_acceptable_password, is_reasonable_email, normalize_email, trimmed_non_empty, Role,
    MAX_PASSWORD_LEN,
};

use crate::error::ApiError;
use crate::models::{AuthResponse, Claims, LoginRequest, RegisterRequest, UserRow};
use crate::AppState;

pub(crate) fn create_token(
    user_id: Uuid,
    role: &str,
    secret: &str,
    ttl_days: i64,
) -> Result<String, ApiError> {
    let expiration = (Utc::now() + Duration::days(ttl_days)).timestamp() as usize;
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        exp: expiration,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| ApiError::Internal(err.into()))
}

pub(crate) fn bearer_claims(headers: &HeaderMap, secret: &str) -> Result<Claims, ApiError> {
    let token = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(ApiError::InvalidToken)?;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::InvalidToken)
}

// Argon2 work happens off the async runtime.
pub(crate) async fn hash_password(password: String) -> Result<String, ApiError> {
    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(|err| ApiError::Internal(err.into()))?
    .map_err(|err| ApiError::Internal(anyhow::anyhow!("password hashing failed: {err}")))
}

pub(crate) async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    task::spawn_blocking(move || match PasswordHash::new(&hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await
    .map_err(|err| ApiError::Internal(err.into()))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let role =
        Role::from_str(&payload.role).map_err(|_| ApiError::MissingFields("role".to_string()))?;

    let mut missing = Vec::new();
    if trimmed_non_empty(&payload.first_name).is_none() {
        missing.push("first_name");
    }
    if trimmed_non_empty(&payload.last_name).is_none() {
        missing.push("last_name");
    }
    if !missing.is_empty() {
        return Err(ApiError::MissingFields(missing.join(", ")));
    }

    let email = normalize_email(&payload.email);
    if !is_reasonable_email(&email) {
        return Err(ApiError::MissingFields("email".to_string()));
    }
    if !is_acceptable_password(&payload.password) {
        return Err(ApiError::MissingFields("password".to_string()));
    }

    tracing::info!("Register request received for email: {email}");

    let existing = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Duplicate("Account"));
    }

    let password_hash = hash_password(payload.password).await?;

    // The unique index on email settles concurrent registrations; the
    // loser of that race gets the same duplicate answer as the pre-check.
    let user = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (id, role, first_name, last_name, email, password_hash,
                            phone, institution, major, year_level, department,
                            position, experience, subjects, bio)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(role.as_str())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(&email)
    .bind(&password_hash)
    .bind(&payload.phone)
    .bind(&payload.institution)
    .bind(&payload.major)
    .bind(&payload.year_level)
    .bind(&payload.department)
    .bind(&payload.position)
    .bind(&payload.experience)
    .bind(&payload.subjects)
    .bind(&payload.bio)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::conflict_on("Account"))?;

    let token = create_token(user.id, &user.role, &state.jwt_secret, state.token_ttl_days)?;
    tracing::info!("Registered {} account {}", user.role, user.id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let role =
        Role::from_str(&payload.role).map_err(|_| ApiError::MissingFields("role".to_string()))?;
    let email = normalize_email(&payload.email);
    if payload.password.is_empty() || payload.password.len() > MAX_PASSWORD_LEN {
        return Err(ApiError::InvalidCredentials);
    }

    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1 AND role = $2")
        .bind(&email)
        .bind(role.as_str())
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Account"))?;

    let valid = verify_password(payload.password, user.password_hash.clone()).await?;
    if !valid {
        return Err(ApiError::InvalidCredentials);
    }

    let token = create_token(user.id, &user.role, &state.jwt_secret, state.token_ttl_days)?;
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

pub async fn session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<crate::models::ProfileView>, ApiError> {
    let claims = bearer_claims(&headers, &state.jwt_secret)?;

    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::InvalidToken)?;

    Ok(Json(user.into()))
}
