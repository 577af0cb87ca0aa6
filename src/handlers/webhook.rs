use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;

use crate::AppState;
use crate::error::AppError;
use crate::handlers::auth::AuthUser;
use crate::services::InitiateRequest;
use crate::store::Store;

/// Records a pending payment attempt and hands back the reference the client
/// will carry to the gateway.
pub async fn initiate<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Json(request): Json<InitiateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.reconciler.initiate(auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Unauthenticated gateway webhook. The payload is opaque: unknown fields and
/// duplicate deliveries are expected, and the response is a bare
/// acknowledgment so the gateway stops retrying.
pub async fn callback<S: Store>(
    State(state): State<AppState<S>>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let ack = state.reconciler.reconcile(payload).await?;
    Ok(Json(ack))
}

/// Transaction lookup, visible to its owner or an admin only. Anyone else
/// gets a 404 rather than a 403.
pub async fn get_transaction<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = state
        .reconciler
        .transaction_for(&reference, auth.user_id, auth.role.is_admin())
        .await?;
    Ok(Json(transaction))
}
