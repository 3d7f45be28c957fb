use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthOperator;
use crate::engine::service::{
    self, AssignmentFilter, AssignmentPage, CreateAssignment, UpdateAssignment,
};
use crate::error::AppError;
use crate::models::assignment::DeliveryAssignment;
use crate::models::history::StatusHistoryEntry;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/assignments",
            get(list_assignments)
                .post(create_assignment)
                .patch(update_assignment)
                .delete(delete_assignment),
        )
        .route("/assignments/history", get(assignment_history))
}

#[derive(Serialize)]
struct AssignmentResponse {
    assignment: DeliveryAssignment,
}

async fn list_assignments(
    State(state): State<Arc<AppState>>,
    _operator: AuthOperator,
    Query(filter): Query<AssignmentFilter>,
) -> Json<AssignmentPage> {
    Json(service::list_assignments(&state, &filter))
}

async fn create_assignment(
    State(state): State<Arc<AppState>>,
    AuthOperator(operator): AuthOperator,
    Json(payload): Json<CreateAssignment>,
) -> Result<(StatusCode, Json<AssignmentResponse>), AppError> {
    let assignment = service::create_assignment(&state, &operator, payload)?;
    Ok((StatusCode::CREATED, Json(AssignmentResponse { assignment })))
}

async fn update_assignment(
    State(state): State<Arc<AppState>>,
    AuthOperator(operator): AuthOperator,
    Json(payload): Json<UpdateAssignment>,
) -> Result<Json<AssignmentResponse>, AppError> {
    let assignment = service::update_assignment(&state, &operator, payload)?;
    Ok(Json(AssignmentResponse { assignment }))
}

#[derive(Deserialize)]
struct DeleteParams {
    id: Uuid,
}

async fn delete_assignment(
    State(state): State<Arc<AppState>>,
    AuthOperator(operator): AuthOperator,
    Query(params): Query<DeleteParams>,
) -> Result<Json<Value>, AppError> {
    service::delete_assignment(&state, &operator, params.id)?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
struct HistoryParams {
    assignment_id: Uuid,
}

/// Audit view of an assignment's transition trail. Works for deleted
/// assignments too; their entries are never removed.
async fn assignment_history(
    State(state): State<Arc<AppState>>,
    _operator: AuthOperator,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<StatusHistoryEntry>> {
    Json(state.history.for_assignment(params.assignment_id))
}
