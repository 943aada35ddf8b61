use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Json, Router,
};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod fanout;
pub mod files;
pub mod handlers;
pub mod models;

use config::Config;
use delivery::DeliveryChannel;
use files::FileStore;

// Shared ceiling for material and submission uploads.
pub const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

pub struct AppState {
    pub db: PgPool,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub files: FileStore,
    pub delivery: Arc<dyn DeliveryChannel>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let uploads = ServeDir::new(state.files.root());

    Router::new()
        .route("/readyz", get(health_check))
        .route("/api/register", post(handlers::auth::register))
        .route("/api/login", post(handlers::auth::login))
        .route("/api/session", get(handlers::auth::session))
        .route("/api/profile", put(handlers::profile::update_profile))
        .route("/api/profile/:user_id", get(handlers::profile::get_profile))
        .route("/api/courses", post(handlers::courses::create_course))
        .route("/api/courses", get(handlers::courses::list_courses))
        .route("/api/courses/:course_id", get(handlers::courses::get_course))
        .route("/api/courses/:course_id", delete(handlers::courses::delete_course))
        .route("/api/courses/:course_id/enroll", post(handlers::courses::enroll))
        .route("/api/courses/:course_id/unenroll", post(handlers::courses::unenroll))
        .route("/api/courses/:course_id/materials", post(handlers::courses::upload_material))
        .route("/api/courses/:course_id/materials", get(handlers::courses::list_materials))
        .route("/api/courses/:course_id/assignments", post(handlers::assignments::create_assignment))
        .route("/api/courses/:course_id/assignments", get(handlers::assignments::list_assignments))
        .route("/api/teachers/:teacher_id/courses", get(handlers::courses::teacher_courses))
        .route("/api/students/:student_id/courses", get(handlers::courses::student_courses))
        .route("/api/assignments/:assignment_id", get(handlers::assignments::get_assignment))
        .route("/api/assignments/:assignment_id/submit", post(handlers::assignments::submit))
        .route("/api/assignments/:assignment_id/submissions", get(handlers::assignments::list_submissions))
        .route("/api/submissions/:submission_id/grade", put(handlers::assignments::grade_submission))
        .route("/api/notifications/:role/:user_id", get(handlers::notifications::list_notifications))
        .route("/api/notifications/:notification_id/read", put(handlers::notifications::mark_notification_read))
        .route("/api/messages", post(handlers::messages::send_message))
        .route("/api/messages/:user_id", get(handlers::messages::list_messages))
        .route("/api/password-reset/request", post(handlers::reset::request_reset))
        .route("/api/password-reset/verify", post(handlers::reset::verify_reset))
        .route("/api/password-reset/confirm", post(handlers::reset::confirm_reset))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();
    let pool = db::connect(&config).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let state = Arc::new(AppState {
        db: pool,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl_days: config.token_ttl_days,
        files: FileStore::new(&config.upload_dir),
        delivery: Arc::new(delivery::LoggedDelivery),
    });

    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Lyceum API listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "lyceum-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
