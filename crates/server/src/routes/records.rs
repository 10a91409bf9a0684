use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use models::{PhotoSlot, Record, RecordFields};
use serde::{Deserialize, Serialize};
use service::photos::{PhotoUpload, UploadRejection, UploadReport};
use tracing::{info, warn};

use crate::errors::JsonApiError;
use crate::routes::WithNotice;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub index: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct Removed {
    pub removed: bool,
}

/// Most-recent-first; `?q=` filters case-insensitively.
pub async fn list(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Json<Vec<Record>> {
    let term = query.q.unwrap_or_default();
    Json(state.records.search(&term).await)
}

pub async fn create(
    State(state): State<AppState>,
    Json(fields): Json<RecordFields>,
) -> (StatusCode, Json<WithNotice<Record>>) {
    let committed = state.records.create(fields).await;
    info!(record_id = %committed.value.id, "record created");
    (StatusCode::CREATED, Json(WithNotice::new(committed.value, committed.notice)))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Record>, JsonApiError> {
    state
        .records
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| JsonApiError::not_found(format!("record {id} not found")))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(fields): Json<RecordFields>,
) -> Result<Json<WithNotice<Record>>, JsonApiError> {
    let committed = state.records.update(&id, fields).await;
    let record = committed
        .value
        .ok_or_else(|| JsonApiError::not_found(format!("record {id} not found")))?;
    Ok(Json(WithNotice::new(record, committed.notice)))
}

pub async fn delete_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WithNotice<Deleted>>, JsonApiError> {
    let committed = state.workbook.lock().await.confirm_delete(&id).await;
    if !committed.value {
        return Err(JsonApiError::not_found(format!("record {id} not found")));
    }
    Ok(Json(WithNotice::new(Deleted { deleted: true }, committed.notice)))
}

/// Every multipart part carrying a file name is one upload; oversized files
/// are reported individually in the response.
pub async fn upload_photos(
    State(state): State<AppState>,
    Path((id, slot)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<Json<WithNotice<UploadReport>>, JsonApiError> {
    let slot = slot.parse::<PhotoSlot>().map_err(|e| JsonApiError::bad_request(e.to_string()))?;
    let (uploads, oversized) = read_uploads(multipart, state.upload_policy.max_file_bytes).await?;

    let committed = state
        .records
        .attach_photos(&id, slot, uploads, state.upload_policy)
        .await?;
    let mut report = committed.value;
    report.rejected.extend(oversized);
    Ok(Json(WithNotice::new(report, committed.notice)))
}

/// Read parts chunk by chunk. Once a part passes `limit` its remaining bytes
/// are only counted and the part comes back as a rejection.
pub(crate) async fn read_uploads(
    mut multipart: Multipart,
    limit: u64,
) -> Result<(Vec<PhotoUpload>, Vec<UploadRejection>), JsonApiError> {
    let mut uploads = Vec::new();
    let mut oversized = Vec::new();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| JsonApiError::bad_request(e.to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let mut bytes = Vec::new();
        let mut size: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| JsonApiError::bad_request(e.to_string()))?
        {
            size += chunk.len() as u64;
            if size <= limit {
                bytes.extend_from_slice(&chunk);
            }
        }
        if size > limit {
            warn!(file = %file_name, size, limit, "upload rejected while streaming: too large");
            oversized.push(UploadRejection::too_large(file_name, size, limit));
        } else {
            uploads.push(PhotoUpload::new(file_name, content_type.as_deref(), bytes));
        }
    }
    Ok((uploads, oversized))
}

pub async fn remove_photo(
    State(state): State<AppState>,
    Path((id, slot)): Path<(String, String)>,
    Query(query): Query<IndexQuery>,
) -> Result<Json<WithNotice<Removed>>, JsonApiError> {
    let slot = slot.parse::<PhotoSlot>().map_err(|e| JsonApiError::bad_request(e.to_string()))?;
    let committed = state.records.remove_photo(&id, slot, query.index).await?;
    Ok(Json(WithNotice::new(Removed { removed: committed.value }, committed.notice)))
}
