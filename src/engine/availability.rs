use uuid::Uuid;

use crate::error::AppError;
use crate::models::rider::{Rider, RiderStatus};
use crate::state::AppState;

/// Looks up a rider and checks they may take new work. Only checked at
/// assignment creation; a rider going off duty later does not invalidate
/// deliveries already in flight.
pub fn require_available_rider(state: &AppState, rider_id: Uuid) -> Result<Rider, AppError> {
    let rider = state
        .riders
        .get(&rider_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("rider {rider_id} not found")))?;

    match rider.status {
        RiderStatus::Active => Ok(rider),
        unavailable => Err(AppError::BadRequest(format!(
            "rider {} is {} and cannot take new deliveries",
            rider.full_name,
            unavailable.as_str()
        ))),
    }
}
