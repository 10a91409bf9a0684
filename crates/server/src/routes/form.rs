//! The device's single entry-form session and detail view.

use std::collections::BTreeMap;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use models::{PhotoSlot, Record, TextField};
use serde::Serialize;
use service::autofill::AutofillOutcome;
use service::errors::ServiceError;
use service::photos::UploadReport;
use service::workbook::Form;
use tracing::info;

use crate::errors::JsonApiError;
use crate::routes::autofill::{unfilled_response, AutofillRequest};
use crate::routes::records::{read_uploads, IndexQuery, Removed};
use crate::routes::WithNotice;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DetailView {
    pub id: Option<String>,
}

fn no_form() -> JsonApiError {
    JsonApiError::not_found("no entry form is open")
}

pub async fn current(State(state): State<AppState>) -> Result<Json<Form>, JsonApiError> {
    state.workbook.lock().await.form().cloned().map(Json).ok_or_else(no_form)
}

pub async fn open_new(State(state): State<AppState>) -> (StatusCode, Json<Form>) {
    let mut wb = state.workbook.lock().await;
    wb.open_new();
    (StatusCode::CREATED, Json(wb.form().cloned().unwrap_or_default()))
}

pub async fn open_edit(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Form>, JsonApiError> {
    let mut wb = state.workbook.lock().await;
    wb.open_edit(&id).await?;
    wb.form().cloned().map(Json).ok_or_else(no_form)
}

/// `{"customerName": "...", ...}`; every key is checked before any is applied.
pub async fn set_fields(
    State(state): State<AppState>,
    Json(values): Json<BTreeMap<String, String>>,
) -> Result<Json<Form>, JsonApiError> {
    let parsed = values
        .into_iter()
        .map(|(name, value)| name.parse::<TextField>().map(|field| (field, value)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(ServiceError::from)?;

    let mut wb = state.workbook.lock().await;
    for (field, value) in parsed {
        wb.set_field(field, value)?;
    }
    wb.form().cloned().map(Json).ok_or_else(no_form)
}

pub async fn upload_photos(
    State(state): State<AppState>,
    Path(slot): Path<String>,
    multipart: Multipart,
) -> Result<Json<UploadReport>, JsonApiError> {
    let slot = slot.parse::<PhotoSlot>().map_err(|e| JsonApiError::bad_request(e.to_string()))?;
    let (uploads, oversized) = read_uploads(multipart, state.upload_policy.max_file_bytes).await?;
    let mut report = state.workbook.lock().await.attach_photos(slot, uploads)?;
    report.rejected.extend(oversized);
    Ok(Json(report))
}

pub async fn remove_photo(
    State(state): State<AppState>,
    Path(slot): Path<String>,
    Query(query): Query<IndexQuery>,
) -> Result<Json<Removed>, JsonApiError> {
    let slot = slot.parse::<PhotoSlot>().map_err(|e| JsonApiError::bad_request(e.to_string()))?;
    let removed = state.workbook.lock().await.remove_photo(slot, query.index)?;
    Ok(Json(Removed { removed }))
}

/// Extraction runs without holding the session; the result is merged afterwards.
pub async fn autofill(State(state): State<AppState>, Json(req): Json<AutofillRequest>) -> Response {
    if state.workbook.lock().await.form().is_none() {
        return JsonApiError::from(ServiceError::Validation("no entry form is open".into())).into_response();
    }
    match state.autofill_gate.try_run(state.extractor.as_ref(), &req.text).await {
        AutofillOutcome::Filled(partial) => {
            let mut wb = state.workbook.lock().await;
            if let Err(e) = wb.merge_autofill(&partial) {
                return JsonApiError::from(e).into_response();
            }
            match wb.form().cloned() {
                Some(form) => Json(form).into_response(),
                None => no_form().into_response(),
            }
        }
        other => unfilled_response(&other),
    }
}

pub async fn submit(State(state): State<AppState>) -> Result<Json<WithNotice<Record>>, JsonApiError> {
    let committed = state.workbook.lock().await.submit().await?;
    info!(record_id = %committed.value.id, "entry form submitted");
    Ok(Json(WithNotice::new(committed.value, committed.notice)))
}

pub async fn cancel(State(state): State<AppState>) -> StatusCode {
    state.workbook.lock().await.cancel();
    StatusCode::NO_CONTENT
}

pub async fn detail(State(state): State<AppState>) -> Json<DetailView> {
    Json(DetailView { id: state.workbook.lock().await.detail().map(str::to_string) })
}

pub async fn open_detail(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Record>, JsonApiError> {
    Ok(Json(state.workbook.lock().await.open_detail(&id).await?))
}

pub async fn close_detail(State(state): State<AppState>) -> StatusCode {
    state.workbook.lock().await.close_detail();
    StatusCode::NO_CONTENT
}
