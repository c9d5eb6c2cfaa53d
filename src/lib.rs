pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod services;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::services::AppState;

/// Room for the text fields sent alongside an upload.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let origin = match HeaderValue::from_str(frontend_url) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!(frontend_url, "FRONTEND_URL is not a valid origin; CORS disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_size + FORM_OVERHEAD_BYTES;
    let uploads = ServeDir::new(state.config.upload_dir.clone());
    let cors = cors_layer(&state.config.frontend_url);

    Router::new()
        .route("/", get(handlers::health::banner))
        .route("/api/health", get(handlers::health::health_check))
        // Auth
        .route("/api/auth/signup", post(handlers::auth::signup))
        .route("/api/auth/login", post(handlers::auth::login))
        // Profile
        .route(
            "/api/profile",
            get(handlers::profile::get_profile)
                .put(handlers::profile::update_profile)
                .delete(handlers::profile::delete_account),
        )
        .route("/api/profile/password", put(handlers::profile::change_password))
        // Settings
        .route(
            "/api/settings",
            get(handlers::settings::get_settings).put(handlers::settings::update_settings),
        )
        // Study groups
        .route(
            "/api/study-groups",
            get(handlers::groups::list_groups).post(handlers::groups::create_group),
        )
        .route(
            "/api/study-groups/:id",
            get(handlers::groups::get_group)
                .put(handlers::groups::update_group)
                .delete(handlers::groups::delete_group),
        )
        .route("/api/study-groups/:id/join", post(handlers::groups::join_group))
        .route("/api/study-groups/:id/leave", delete(handlers::groups::leave_group))
        // Resources
        .route(
            "/api/resources",
            get(handlers::resources::list_resources).post(handlers::resources::create_resource),
        )
        .route(
            "/api/resources/:id",
            get(handlers::resources::get_resource)
                .put(handlers::resources::update_resource)
                .delete(handlers::resources::delete_resource),
        )
        .route(
            "/api/resources/preview/:filename",
            get(handlers::resources::preview_file),
        )
        .route(
            "/api/resources/download/:filename",
            get(handlers::resources::download_file),
        )
        .nest_service("/uploads", uploads)
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
