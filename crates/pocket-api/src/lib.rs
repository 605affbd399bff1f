//! # pocket-api
//!
//! HTTP API for Pocket Universe: accounts, the AI categorization pipeline,
//! the dashboard, playground uploads, and signed image downloads.
//!
//! The binary in `main.rs` wires configuration, logging, and the database,
//! then serves [`router`].

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod services;
pub mod state;

pub use config::AppConfig;
pub use error::ApiError;
pub use state::{build_generation_backend, AppState};

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;
use uuid::Uuid;

use pocket_core::defaults;

use handlers::{auth as auth_handlers, dashboard, health, images, pipeline, playground};

/// Time-ordered UUIDv7 request ids, so ids sort with the logs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(subsystem = "api", origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/health", get(health::health))
        // Accounts
        .route("/api/auth/signup", post(auth_handlers::signup))
        .route("/api/auth/signin", post(auth_handlers::signin))
        .route("/api/auth/signout", post(auth_handlers::signout))
        // Categorization
        .route("/api/ai/pipeline", post(pipeline::run_pipeline))
        // Dashboard
        .route(
            "/api/dashboard",
            get(dashboard::get_dashboard)
                .post(dashboard::post_dashboard)
                .put(dashboard::put_dashboard)
                .delete(dashboard::delete_dashboard),
        )
        .route("/api/dashboard/fetchPlanets", get(dashboard::fetch_planets))
        // Playground
        .route("/api/playground/galaxyCheck", post(playground::galaxy_check))
        .route("/api/playground/planetCreate", post(playground::planet_create))
        .route("/api/playground/imgStorage", post(playground::img_storage))
        // Images
        .route("/api/images/:id/url", get(images::refresh_url))
        .route("/api/storage/*key", get(images::download))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
        .layer(DefaultBodyLimit::max(defaults::BODY_LIMIT_BYTES))
        .layer(RequestBodyLimitLayer::new(defaults::BODY_LIMIT_BYTES))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
