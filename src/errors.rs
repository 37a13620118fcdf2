use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::AppointmentStatus;

/// Caller-facing failures of the booking core. Everything except `Storage`
/// is a recoverable, expected outcome.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("slot {0} is already booked")]
    SlotAlreadyBooked(String),

    #[error("slot {0} is booked and cannot be deleted")]
    SlotBooked(String),

    #[error("doctor {0} is not approved for bookings")]
    DoctorNotApproved(String),

    #[error("cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("doctor {0} still has booked slots")]
    DoctorHasBookedSlots(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl BookingError {
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::NotFound(_) => "not_found",
            BookingError::SlotAlreadyBooked(_) => "slot_already_booked",
            BookingError::SlotBooked(_) => "slot_booked",
            BookingError::DoctorNotApproved(_) => "doctor_not_approved",
            BookingError::InvalidTransition { .. } => "invalid_transition",
            BookingError::Forbidden(_) => "forbidden",
            BookingError::Validation(_) => "validation",
            BookingError::DoctorHasBookedSlots(_) => "doctor_has_booked_slots",
            BookingError::Storage(_) => "storage",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::SlotAlreadyBooked(_)
            | BookingError::SlotBooked(_)
            | BookingError::InvalidTransition { .. }
            | BookingError::DoctorHasBookedSlots(_) => StatusCode::CONFLICT,
            BookingError::DoctorNotApproved(_) | BookingError::Forbidden(_) => {
                StatusCode::FORBIDDEN
            }
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// HTTP boundary error.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            AppError::Booking(e) => (e.status_code(), e.kind()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation"),
        };

        if let AppError::Booking(BookingError::Storage(e)) = &self {
            tracing::error!(error = %e, "storage failure");
        }

        let body = serde_json::json!({ "error": self.to_string(), "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}
