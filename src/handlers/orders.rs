use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::AppState;
use crate::domain::{Order, OrderItem};
use crate::error::AppError;
use crate::handlers::auth::AuthUser;
use crate::services::OrderItemRequest;
use crate::store::Store;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

pub async fn create_order<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (order, items) = state
        .settlements
        .create_order(auth.user_id, request.items)
        .await?;
    Ok((StatusCode::CREATED, Json(OrderResponse { order, items })))
}

#[derive(Debug, Deserialize)]
pub struct PayOrderRequest {
    pub order_id: i64,
}

pub async fn pay_order<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Json(request): Json<PayOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = state
        .settlements
        .pay_order(auth.user_id, request.order_id)
        .await?;
    Ok(Json(json!({
        "detail": "order paid",
        "transaction": transaction,
    })))
}
