//! API module for handling HTTP requests and responses

#[cfg(feature = "web")]
pub(crate) mod form;
#[cfg(feature = "web")]
pub(crate) mod handlers;
#[cfg(feature = "web")]
pub(crate) mod pages;
#[cfg(feature = "web")]
pub(crate) mod responses;

#[cfg(feature = "web")]
use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
#[cfg(feature = "web")]
use std::sync::Arc;
#[cfg(feature = "web")]
use tower::ServiceBuilder;
#[cfg(feature = "web")]
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
#[cfg(feature = "web")]
use crate::state::AppState;

#[cfg(feature = "web")]
pub(crate) use handlers::*;
#[cfg(feature = "web")]
use responses::{ApiResponse, HealthResponse, ModelStatus};

#[cfg(feature = "web")]
/// Create the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.request_body_limit();

    Router::new()
        // Interactive page
        .route("/", get(index))
        .route("/upload", post(upload_image))
        .route("/predict", post(predict))
        // JSON API
        .route("/api/health", get(health_check))
        .route("/api/model", get(model_status))
        .route("/api/predict", post(api_predict))
        .layer(
            ServiceBuilder::new()
                // Must stay outermost: `Cors` requires a `Default` inner response body
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

#[cfg(feature = "web")]
/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::build_info::PKG_VERSION,
        built_at: crate::build_info::BUILT_TIME_UTC,
        model_ready: state.model.is_ready(),
    })
}

#[cfg(feature = "web")]
/// Report whether the model loaded, and where it runs
pub async fn model_status(State(state): State<Arc<AppState>>) -> ApiResponse<ModelStatus> {
    ApiResponse::success(ModelStatus::from(state.model.as_ref()))
}
