//! HTTP interface for roster.
//!
//! [`router`] builds the full axum application: the student routes, the
//! informational `/` and `/health` endpoints, a JSON 404 fallback, and the
//! middleware stack (request tracing, optional permissive CORS, and a panic
//! guard that answers 500 instead of dropping the connection).

pub mod error;
mod students;

use std::any::Any;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::storage::StudentStore;

pub use error::ApiError;
pub use students::{Deleted, StudentStats};

/// State shared by every request.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The record store handlers read and write.
    pub store: Arc<dyn StudentStore>,
    /// Include panic messages in 500 responses.
    pub expose_error_details: bool,
    /// Answer cross-origin requests from any origin.
    pub cors_enabled: bool,
}

impl AppState {
    /// State around `store` with production defaults: panic details are
    /// hidden and CORS is open.
    #[must_use]
    pub fn new(store: Arc<dyn StudentStore>) -> Self {
        Self {
            store,
            expose_error_details: false,
            cors_enabled: true,
        }
    }

    /// Set whether 500 responses carry the underlying message.
    #[must_use]
    pub fn with_error_details(mut self, expose: bool) -> Self {
        self.expose_error_details = expose;
        self
    }

    /// Set whether permissive CORS is applied.
    #[must_use]
    pub fn with_cors(mut self, enabled: bool) -> Self {
        self.cors_enabled = enabled;
        self
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let expose = state.expose_error_details;
    let cors_enabled = state.cors_enabled;

    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/students", get(students::list).post(students::create))
        .route("/api/students/stats", get(students::stats))
        .route(
            "/api/students/{id}",
            get(students::get_one)
                .put(students::update)
                .delete(students::delete),
        )
        .fallback(route_not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        app = app.layer(CorsLayer::permissive());
    }

    app.layer(CatchPanicLayer::custom(
        move |panic: Box<dyn Any + Send + 'static>| panic_response(panic, expose),
    ))
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Welcome to Student Management System API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "students": "/api/students",
        },
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "UP",
        "message": "Student Management API is running",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

async fn route_not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Route not found")
}

fn panic_response(panic: Box<dyn Any + Send + 'static>, expose: bool) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| (*s).to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    error!(panic = %detail, "Request handler panicked");

    let error = if expose { json!(detail) } else { json!({}) };
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong!")
        .with_error(error)
        .into_response()
}
