//! Authorization signing handler.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};
use stow_signer::SigningScheme;

/// Query parameters for the signature endpoint.
#[derive(Debug, Deserialize)]
pub struct SignatureQuery {
    /// Sign with the scoped v4 scheme instead of the legacy one.
    #[serde(default)]
    v4: bool,
}

/// Sign a policy document or a canonical REST request string.
///
/// The request body dispatches on shape: a body carrying a `headers` string
/// is a REST signing request, anything else is treated as a policy document.
/// Rejections (wrong bucket, tampered size bounds, malformed scope) come back
/// as `{"invalid": true}` with 400 so upload clients abort instead of
/// retrying with the same doomed request.
pub async fn sign(
    State(state): State<AppState>,
    Query(query): Query<SignatureQuery>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let signer = state
        .signer
        .as_ref()
        .ok_or_else(|| ApiError::Internal("signing is not configured".to_string()))?;

    let scheme = if query.v4 {
        SigningScheme::V4
    } else {
        SigningScheme::V2
    };

    if let Some(headers) = body.get("headers").and_then(Value::as_str) {
        let signature = signer.sign_rest(headers, scheme)?;
        Ok(Json(json!({ "signature": signature })))
    } else {
        let signed = signer.sign_policy(&body, scheme)?;
        Ok(Json(json!({
            "policy": signed.policy,
            "signature": signed.signature,
        })))
    }
}
