use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthOperator;
use crate::error::AppError;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_name: String,
    pub shipping_address: String,
    pub contact_phone: String,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    _operator: AuthOperator,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    if payload.shipping_address.trim().is_empty() {
        return Err(AppError::BadRequest(
            "shipping_address cannot be empty".to_string(),
        ));
    }

    let now = Utc::now();
    let order = Order {
        id: Uuid::new_v4(),
        order_number: state.next_order_number(),
        status: OrderStatus::Processing,
        customer_name: payload.customer_name,
        shipping_address: payload.shipping_address,
        contact_phone: payload.contact_phone,
        created_at: now,
        updated_at: now,
    };

    state.orders.insert(order.id, order.clone());
    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    _operator: AuthOperator,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

    Ok(Json(order.value().clone()))
}
