//! # Routes
//!
//! Axum router configuration for the storefront API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Catalog:
///   - GET  /api/v1/products - Product selector
///   - GET  /api/v1/products/{id} - Get product by ID
///
/// - Session:
///   - POST   /api/v1/sessions - Open a session
///   - GET    /api/v1/session - Current order and delivery
///   - DELETE /api/v1/session - End the session
///
/// - Checkout:
///   - POST /api/v1/checkout - Pay (create gateway order)
///   - POST /api/v1/checkout/confirm - Confirm (capture and deliver)
///   - GET  /api/v1/download - Delivered file
///
/// - Gateway landing pages:
///   - GET /checkout/return - Buyer approved
///   - GET /checkout/cancel - Buyer cancelled
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(crate::session::SESSION_HEADER),
        ]);

    let checkout_pages = Router::new()
        .route("/return", get(handlers::checkout_return))
        .route("/cancel", get(handlers::checkout_cancel));

    let api_routes = Router::new()
        // Catalog
        .route("/products", get(handlers::list_products))
        .route("/products/{product_id}", get(handlers::get_product))
        // Session
        .route("/sessions", post(handlers::open_session))
        .route(
            "/session",
            get(handlers::get_session).delete(handlers::end_session),
        )
        // Checkout
        .route("/checkout", post(handlers::create_checkout))
        .route("/checkout/confirm", post(handlers::confirm_checkout))
        .route("/download", get(handlers::download));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/checkout", checkout_pages)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
