pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/signup", post(handlers::auth::signup))
        .route("/api/users/:id", get(handlers::auth::get_user))
        .route(
            "/api/chargers",
            post(handlers::chargers::create_charger).get(handlers::chargers::list_chargers),
        )
        .route("/api/chargers/search", get(handlers::chargers::search_chargers))
        .route(
            "/api/chargers/:id",
            get(handlers::chargers::get_charger)
                .put(handlers::chargers::update_charger)
                .delete(handlers::chargers::delete_charger),
        )
        .route("/api/chargers/:id/slots", get(handlers::chargers::free_slots))
        .route(
            "/api/bookings",
            post(handlers::bookings::create_booking).get(handlers::bookings::list_driver_bookings),
        )
        .route("/api/bookings/host", get(handlers::bookings::list_host_bookings))
        .route("/api/bookings/events", get(handlers::bookings::events_stream))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/accept",
            post(handlers::bookings::accept_booking),
        )
        .route(
            "/api/bookings/:id/reject",
            post(handlers::bookings::reject_booking),
        )
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
