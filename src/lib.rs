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

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/doctors", post(handlers::doctors::register_doctor))
        .route("/api/doctors/:id", get(handlers::doctors::get_doctor))
        .route("/api/doctors/:id/slots", get(handlers::doctors::available_slots))
        .route("/api/doctors/:id/schedule", get(handlers::doctors::schedule))
        .route(
            "/api/doctors/:id/appointments",
            get(handlers::doctors::doctor_appointments),
        )
        .route("/api/slots", post(handlers::slots::create_slot))
        .route("/api/slots/generate", post(handlers::slots::generate_slots))
        .route(
            "/api/slots/:id",
            axum::routing::delete(handlers::slots::delete_slot),
        )
        .route(
            "/api/appointments",
            post(handlers::appointments::create_appointment),
        )
        .route(
            "/api/appointments/:id",
            get(handlers::appointments::get_appointment),
        )
        .route(
            "/api/appointments/:id/status",
            axum::routing::patch(handlers::appointments::update_status)
                .put(handlers::appointments::update_status),
        )
        .route(
            "/api/patients/:id/appointments",
            get(handlers::appointments::patient_appointments),
        )
        .route("/api/admin/status", get(handlers::admin::get_status))
        .route(
            "/api/admin/appointments",
            get(handlers::admin::get_appointments),
        )
        .route(
            "/api/admin/doctors/:id/approve",
            post(handlers::admin::approve_doctor),
        )
        .route(
            "/api/admin/doctors/:id/reject",
            post(handlers::admin::reject_doctor),
        )
        .route(
            "/api/admin/doctors/:id",
            axum::routing::delete(handlers::admin::remove_doctor),
        )
        .route("/api/admin/consistency", get(handlers::admin::consistency))
        .route(
            "/api/admin/consistency/repair",
            post(handlers::admin::repair_consistency),
        )
        .route(
            "/calendar/:appointment_id",
            get(handlers::calendar::download_ics),
        )
        .with_state(state)
}
