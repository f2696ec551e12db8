//! Libtwin digital library server
//!
//! REST JSON API and WebSocket channel for a campus library: catalog, student
//! registry, borrow request lifecycle, RFID gate scans, section traffic
//! counters and overdue fines.

use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod realtime;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

use realtime::RealtimeHub;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub hub: RealtimeHub,
}

impl AppState {
    pub fn new(config: AppConfig, services: services::Services, hub: RealtimeHub) -> Self {
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
            hub,
        }
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Students
        .route("/student", get(api::students::list_students))
        .route("/student/create", post(api::students::create_student))
        .route("/student/verify", post(api::students::verify_student))
        .route(
            "/student/:id",
            get(api::students::get_student)
                .put(api::students::update_student)
                .delete(api::students::delete_student),
        )
        // Books
        .route(
            "/book",
            get(api::books::list_books).post(api::books::create_book),
        )
        .route("/book/analytics/stock", get(api::books::stock_analytics))
        .route(
            "/book/:id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book),
        )
        // Borrow requests
        .route(
            "/issue",
            get(api::borrows::list_requests).post(api::borrows::create_request),
        )
        // Deployed clients post to the trailing-slash form
        .route("/issue/", post(api::borrows::create_request))
        .route("/issue/verify", post(api::borrows::verify_request))
        .route("/issue/student/:id", get(api::borrows::student_requests))
        .route("/issue/status/:status", get(api::borrows::list_by_status))
        .route("/issue/approve/:id", patch(api::borrows::approve_request))
        .route("/issue/reject/:id", patch(api::borrows::reject_request))
        .route("/issue/return/:id", patch(api::borrows::return_request))
        .route("/issue/:id", get(api::borrows::get_request))
        // RFID gate
        .route("/rfid/scan", post(api::rfid::scan))
        .route("/rfid/get-scanned", get(api::rfid::latest_scan))
        .route("/rfid/is-active", post(api::rfid::is_active))
        // Sections
        .route("/pir", get(api::sections::list_sections))
        .route("/pir/scan", post(api::sections::record_visit))
        .route("/pir/book", post(api::sections::record_book_bought))
        // Fines
        .route("/fines", get(api::fines::list_fines))
        .route("/fines/calculate", post(api::fines::calculate))
        .route("/fines/student/:id", get(api::fines::student_fines))
        .route("/fines/:id/paid", patch(api::fines::mark_paid))
        .route("/fines/:id", delete(api::fines::delete_fine))
        // Real-time channel
        .route("/ws", get(realtime::socket::ws_handler))
        .with_state(state);

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
