use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::{authenticate, StatusQuery};
use crate::errors::AppError;
use crate::models::slot::parse_date;
use crate::models::{AppointmentView, DoctorProfile, NewDoctor, Slot};
use crate::state::AppState;

// POST /api/doctors
pub async fn register_doctor(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<NewDoctor>, JsonRejection>,
) -> Result<(StatusCode, Json<DoctorProfile>), AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    let Json(payload) = payload?;
    let doctor = state.booking.register_doctor(&actor, &payload)?;
    Ok((StatusCode::CREATED, Json(doctor)))
}

// GET /api/doctors/:id
pub async fn get_doctor(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DoctorProfile>, AppError> {
    authenticate(&headers, &state.config.api_token)?;
    Ok(Json(state.booking.get_doctor(&id)?))
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: Option<String>,
}

// GET /api/doctors/:id/slots?date=YYYY-MM-DD
pub async fn available_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Vec<Slot>>, AppError> {
    authenticate(&headers, &state.config.api_token)?;
    let date = match query.date.as_deref().filter(|d| !d.is_empty()) {
        Some(raw) => Some(parse_date(raw).map_err(|e| AppError::BadRequest(e.to_string()))?),
        None => None,
    };
    Ok(Json(state.booking.available_slots(&id, date)?))
}

// GET /api/doctors/:id/schedule
pub async fn schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<Slot>>, AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    Ok(Json(state.booking.doctor_schedule(&actor, &id)?))
}

// GET /api/doctors/:id/appointments?status=
pub async fn doctor_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<AppointmentView>>, AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    let status = query.parse()?;
    Ok(Json(state.booking.doctor_appointments(&actor, &id, status)?))
}
