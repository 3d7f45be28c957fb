use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthOperator;
use crate::error::AppError;
use crate::models::rider::{Rider, RiderStatus, VehicleType};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/riders", post(create_rider).get(list_riders))
        .route("/riders/:id/status", patch(update_rider_status))
}

#[derive(Deserialize)]
pub struct CreateRiderRequest {
    pub full_name: String,
    pub phone: String,
    pub vehicle_type: VehicleType,
}

#[derive(Deserialize)]
pub struct UpdateRiderStatusRequest {
    pub status: RiderStatus,
}

async fn create_rider(
    State(state): State<Arc<AppState>>,
    _operator: AuthOperator,
    Json(payload): Json<CreateRiderRequest>,
) -> Result<Json<Rider>, AppError> {
    if payload.full_name.trim().is_empty() {
        return Err(AppError::BadRequest("full_name cannot be empty".to_string()));
    }

    if payload.phone.trim().is_empty() {
        return Err(AppError::BadRequest("phone cannot be empty".to_string()));
    }

    let now = Utc::now();
    let rider = Rider {
        id: Uuid::new_v4(),
        full_name: payload.full_name,
        phone: payload.phone,
        vehicle_type: payload.vehicle_type,
        status: RiderStatus::Active,
        created_at: now,
        updated_at: now,
    };

    state.riders.insert(rider.id, rider.clone());
    Ok(Json(rider))
}

async fn list_riders(
    State(state): State<Arc<AppState>>,
    _operator: AuthOperator,
) -> Json<Vec<Rider>> {
    let riders = state
        .riders
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(riders)
}

/// Availability is maintained here by dispatch staff; assignment operations
/// never write it.
async fn update_rider_status(
    State(state): State<Arc<AppState>>,
    _operator: AuthOperator,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRiderStatusRequest>,
) -> Result<Json<Rider>, AppError> {
    let mut rider = state
        .riders
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("rider {} not found", id)))?;

    rider.status = payload.status;
    rider.updated_at = Utc::now();

    Ok(Json(rider.clone()))
}
