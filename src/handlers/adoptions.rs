use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::AppState;
use crate::error::AppError;
use crate::handlers::auth::AuthUser;
use crate::store::Store;

/// Settles an adoption for the authenticated user. Pricing is resolved
/// server-side; nothing in the request body is trusted for the amount.
pub async fn adopt<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(listing_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let adoption = state.settlements.adopt(auth.user_id, listing_id).await?;
    Ok((StatusCode::CREATED, Json(adoption)))
}
