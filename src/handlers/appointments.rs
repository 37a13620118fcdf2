use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::{authenticate, StatusQuery};
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus, AppointmentView, NewAppointment};
use crate::state::AppState;

// POST /api/appointments
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<NewAppointment>, JsonRejection>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    let Json(payload) = payload?;
    let appointment = state.booking.book(&actor, &payload)?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    Ok(Json(state.booking.get_appointment(&actor, &id)?))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: AppointmentStatus,
}

// PATCH|PUT /api/appointments/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<Appointment>, AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    let Json(payload) = payload?;
    Ok(Json(state.booking.set_status(&actor, &id, payload.status)?))
}

// GET /api/patients/:id/appointments?status=
pub async fn patient_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<AppointmentView>>, AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    let status = query.parse()?;
    Ok(Json(state.booking.patient_appointments(&actor, &id, status)?))
}
