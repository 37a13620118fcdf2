use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use super::authenticate;
use crate::errors::AppError;
use crate::models::{NewSlot, Slot};
use crate::state::AppState;

// POST /api/slots
pub async fn create_slot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<NewSlot>, JsonRejection>,
) -> Result<(StatusCode, Json<Slot>), AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    let Json(payload) = payload?;
    let slot = state.booking.create_slot(&actor, &payload)?;
    Ok((StatusCode::CREATED, Json(slot)))
}

// POST /api/slots/generate
pub async fn generate_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<NewSlot>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<Slot>>), AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    let Json(payload) = payload?;
    let slots = state.booking.generate_slots(&actor, &payload)?;
    Ok((StatusCode::CREATED, Json(slots)))
}

// DELETE /api/slots/:id
pub async fn delete_slot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let actor = authenticate(&headers, &state.config.api_token)?;
    state.booking.delete_slot(&actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
