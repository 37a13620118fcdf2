use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use super::{authenticate, StatusQuery};
use crate::db::DashboardStats;
use crate::errors::AppError;
use crate::models::{AppointmentView, DoctorProfile};
use crate::services::lifecycle::ConsistencyReport;
use crate::state::AppState;

// GET /api/admin/status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardStats>, AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    Ok(Json(state.booking.dashboard_stats(&actor)?))
}

// GET /api/admin/appointments?status=
pub async fn get_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<AppointmentView>>, AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    let status = query.parse()?;
    Ok(Json(state.booking.all_appointments(&actor, status)?))
}

// POST /api/admin/doctors/:id/approve
pub async fn approve_doctor(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DoctorProfile>, AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    Ok(Json(state.booking.approve_doctor(&actor, &id)?))
}

// POST /api/admin/doctors/:id/reject
pub async fn reject_doctor(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DoctorProfile>, AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    Ok(Json(state.booking.reject_doctor(&actor, &id)?))
}

// DELETE /api/admin/doctors/:id
pub async fn remove_doctor(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    state.booking.remove_doctor(&actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/admin/consistency
pub async fn consistency(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ConsistencyReport>, AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    Ok(Json(state.booking.consistency_report(&actor)?))
}

// POST /api/admin/consistency/repair
pub async fn repair_consistency(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ConsistencyReport>, AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    Ok(Json(state.booking.repair_consistency(&actor)?))
}
