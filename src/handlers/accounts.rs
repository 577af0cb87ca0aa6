use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

use crate::AppState;
use crate::error::AppError;
use crate::handlers::auth::AuthUser;
use crate::store::Store;

#[derive(Debug, Deserialize)]
pub struct ProvisionRequest {
    /// Identity to provision; defaults to the caller. Provisioning another
    /// user requires the admin role.
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

pub async fn provision<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Json(request): Json<ProvisionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let target = request.user_id.unwrap_or(auth.user_id);
    if target != auth.user_id && !auth.role.is_admin() {
        return Err(AppError::Forbidden(
            "cannot provision an account for another user".to_string(),
        ));
    }

    let account = state.accounts.provision(target, request.currency).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn me<S: Store>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let account = state.accounts.get(auth.user_id).await?;
    Ok(Json(account))
}
