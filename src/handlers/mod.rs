pub mod accounts;
pub mod adoptions;
pub mod auth;
pub mod orders;
pub mod webhook;

use axum::Json;
use axum::response::IntoResponse;
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
