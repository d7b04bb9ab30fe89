//! HTTP request handlers.

pub mod signature;
pub mod uploads;

pub use signature::sign;
pub use uploads::{delete_upload, delete_upload_post, finish_upload, upload, upload_success};

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

/// Health check endpoint. Verifies the storage backend is reachable.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.storage.health_check().await?;
    Ok(Json(json!({
        "status": "ok",
        "backend": state.storage.backend_name(),
    })))
}
