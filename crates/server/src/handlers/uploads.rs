//! Upload, finish, delete, and post-hoc verification handlers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::multipart::Field;
use axum::extract::{Form, Multipart, Path, Query, State};
use bytes::Bytes;
use serde::Deserialize;
use std::str::FromStr;
use stow_core::upload::{ChunkMeta, UploadId, UploadResponse, sanitize_filename};
use stow_storage::{ChunkStore, StorageError};
use tracing::{info, warn};

/// Query parameters for the upload endpoint.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// When present, combine the upload after storing this part.
    done: Option<String>,
}

/// Multipart form fields accepted by the upload endpoint.
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<Bytes>,
    uuid: Option<String>,
    filename: Option<String>,
    part_index: Option<u32>,
    total_parts: Option<u32>,
    total_file_size: Option<u64>,
}

impl UploadForm {
    /// Drain a multipart body into the known fields, ignoring unknown ones.
    async fn from_multipart(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            ApiError::BadRequest(format!("malformed multipart body: {e}"))
        })? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match name.as_str() {
                "qqfile" => {
                    // The file part carries a filename too; an explicit
                    // qqfilename field always wins over it.
                    if form.filename.is_none()
                        && let Some(file_name) = field.file_name()
                    {
                        form.filename = Some(file_name.to_string());
                    }
                    form.file = Some(field.bytes().await.map_err(|e| {
                        ApiError::BadRequest(format!("unreadable qqfile field: {e}"))
                    })?);
                }
                "qquuid" => form.uuid = Some(text_field(field, "qquuid").await?),
                "qqfilename" => form.filename = Some(text_field(field, "qqfilename").await?),
                "qqpartindex" => {
                    form.part_index = Some(numeric_field(field, "qqpartindex").await?);
                }
                "qqtotalparts" => {
                    form.total_parts = Some(numeric_field(field, "qqtotalparts").await?);
                }
                "qqtotalfilesize" => {
                    form.total_file_size = Some(numeric_field(field, "qqtotalfilesize").await?);
                }
                _ => {}
            }
        }

        Ok(form)
    }

    fn into_meta(self) -> ApiResult<(ChunkMeta, Bytes)> {
        let data = self
            .file
            .ok_or_else(|| ApiError::BadRequest("missing qqfile field".to_string()))?;
        let uuid = self
            .uuid
            .ok_or_else(|| ApiError::BadRequest("missing qquuid field".to_string()))?;
        let upload_id = UploadId::parse(&uuid)?;
        let raw_filename = self
            .filename
            .ok_or_else(|| ApiError::BadRequest("missing qqfilename field".to_string()))?;
        let filename = sanitize_filename(&raw_filename)?;

        let meta = ChunkMeta {
            upload_id,
            part_index: self.part_index,
            total_parts: self.total_parts,
            total_file_size: self.total_file_size,
            filename,
        };
        meta.validate()?;

        Ok((meta, data))
    }
}

async fn text_field(field: Field<'_>, name: &str) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("unreadable field {name}: {e}")))
}

async fn numeric_field<T: FromStr>(field: Field<'_>, name: &str) -> ApiResult<T> {
    let value = text_field(field, name).await?;
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("field {name} is not a number: {value:?}")))
}

/// Handle a part of a chunked upload, or a complete simple upload.
///
/// A request without `qqpartindex` is a simple upload stored directly at its
/// final location. With `qqpartindex`, the part is persisted for later
/// reassembly; when the `done` query parameter is present, reassembly runs
/// immediately after the part lands.
pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let form = UploadForm::from_multipart(multipart).await?;
    let (meta, data) = form.into_meta()?;
    let id = meta.upload_id;

    let max_size = state.config.server.max_file_size;
    if let Some(declared) = meta.total_file_size
        && declared > max_size
    {
        // Refuse and drop anything already stored: re-sending parts of a
        // file that can never be accepted would only waste bandwidth.
        if let Err(e) = state.chunks.delete_upload(&id).await {
            warn!(upload_id = %id, error = %e, "failed to clean up rejected upload");
        }
        return Err(ApiError::TooLarge("Too big!".to_string()));
    }

    if let Some(part_index) = meta.part_index {
        let total_parts = meta
            .total_parts
            .ok_or_else(|| ApiError::BadRequest("missing qqtotalparts field".to_string()))?;

        state
            .chunks
            .store_part(
                &id,
                part_index,
                total_parts,
                &meta.filename,
                meta.total_file_size,
                data,
            )
            .await?;

        if query.done.is_some() {
            let key = state.chunks.combine(&id, &meta.filename, total_parts).await?;
            info!(upload_id = %id, key, "combined upload");
        }
    } else {
        if data.len() as u64 > max_size {
            if let Err(e) = state.chunks.delete_upload(&id).await {
                warn!(upload_id = %id, error = %e, "failed to clean up rejected upload");
            }
            return Err(ApiError::TooLarge("Too big!".to_string()));
        }
        let key = state.chunks.store_simple(&id, &meta.filename, data).await?;
        info!(upload_id = %id, key, "stored simple upload");
    }

    Ok(Json(UploadResponse::ok()))
}

/// Body of the finish request signalling all parts have been sent.
#[derive(Debug, Deserialize)]
pub struct FinishRequest {
    qquuid: String,
    qqfilename: String,
    qqtotalparts: u32,
    qqtotalfilesize: Option<u64>,
}

/// Combine the stored parts of an upload into the final file.
///
/// Fails with the missing indices when a part never arrived; succeeds
/// without rewriting anything when the upload was already combined.
pub async fn finish_upload(
    State(state): State<AppState>,
    Form(request): Form<FinishRequest>,
) -> ApiResult<Json<UploadResponse>> {
    let id = UploadId::parse(&request.qquuid)?;
    let filename = sanitize_filename(&request.qqfilename)?;

    if let Some(declared) = request.qqtotalfilesize
        && declared > state.config.server.max_file_size
    {
        if let Err(e) = state.chunks.delete_upload(&id).await {
            warn!(upload_id = %id, error = %e, "failed to clean up rejected upload");
        }
        return Err(ApiError::TooLarge("Too big!".to_string()));
    }

    let key = state
        .chunks
        .combine(&id, &filename, request.qqtotalparts)
        .await?;
    info!(upload_id = %id, key, "combined upload");

    Ok(Json(UploadResponse::ok()))
}

/// Delete everything belonging to an upload. Idempotent.
pub async fn delete_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<UploadResponse>> {
    let id = UploadId::parse(&upload_id)?;
    state.chunks.delete_upload(&id).await?;
    info!(upload_id = %id, "deleted upload");
    Ok(Json(UploadResponse::ok()))
}

/// Body of a POST standing in for another HTTP method.
#[derive(Debug, Deserialize)]
pub struct MethodOverride {
    #[serde(rename = "_method")]
    method: Option<String>,
}

/// POST fallback for clients that cannot issue a real DELETE.
///
/// Only `_method=DELETE` is honored; any other override is refused with
/// 405 rather than silently treated as a delete.
pub async fn delete_upload_post(
    state: State<AppState>,
    path: Path<String>,
    Form(body): Form<MethodOverride>,
) -> ApiResult<Json<UploadResponse>> {
    match body.method.as_deref() {
        Some(method) if method.eq_ignore_ascii_case("delete") => {
            delete_upload(state, path).await
        }
        other => Err(ApiError::MethodNotAllowed(format!(
            "unsupported method override: {other:?}"
        ))),
    }
}

/// Body of the post-upload success notification.
///
/// Sent after a client uploaded directly to storage with a signed policy.
/// The file is located either by an explicit `key` or by `uuid` + `name`.
#[derive(Debug, Deserialize)]
pub struct SuccessRequest {
    key: Option<String>,
    uuid: Option<String>,
    name: Option<String>,
    bucket: Option<String>,
}

/// Verify a file that was uploaded directly to storage.
///
/// The policy signing path already bounds the declared size, but the client
/// controls what it actually sends; this re-checks the stored object's real
/// size and removes it when it exceeds the limit, telling the client not to
/// retry.
pub async fn upload_success(
    State(state): State<AppState>,
    Form(request): Form<SuccessRequest>,
) -> ApiResult<Json<UploadResponse>> {
    if let (Some(signer), Some(bucket)) = (&state.signer, &request.bucket)
        && bucket != signer.expected_bucket()
    {
        return Err(ApiError::BadRequest(format!(
            "incorrect bucket: {bucket:?}"
        )));
    }

    let key = match request.key {
        Some(key) => key,
        None => {
            let uuid = request.uuid.ok_or_else(|| {
                ApiError::BadRequest("missing key or uuid field".to_string())
            })?;
            let id = UploadId::parse(&uuid)?;
            let name = request
                .name
                .ok_or_else(|| ApiError::BadRequest("missing name field".to_string()))?;
            ChunkStore::final_key(&id, &sanitize_filename(&name)?)
        }
    };

    let meta = state.storage.head(&key).await?;
    if meta.size > state.config.server.max_file_size {
        match state.storage.delete(&key).await {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        info!(key, size = meta.size, "removed oversized upload");
        return Err(ApiError::TooLarge("Too big!".to_string()));
    }

    Ok(Json(UploadResponse::ok()))
}
