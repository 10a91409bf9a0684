use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use service::autofill::AutofillOutcome;

use crate::errors::JsonApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AutofillRequest {
    pub text: String,
}

/// 200 with the partial record, 204 when nothing was found, 409 while another
/// call is outstanding, 502 when the extractor failed.
pub async fn autofill(State(state): State<AppState>, Json(req): Json<AutofillRequest>) -> Response {
    match state.autofill_gate.try_run(state.extractor.as_ref(), &req.text).await {
        AutofillOutcome::Filled(partial) => (StatusCode::OK, Json(partial)).into_response(),
        other => unfilled_response(&other),
    }
}

/// Status for every outcome except `Filled`.
pub(crate) fn unfilled_response(outcome: &AutofillOutcome) -> Response {
    let message = outcome.message().map(str::to_string);
    match outcome {
        AutofillOutcome::Busy => JsonApiError::new(StatusCode::CONFLICT, "Conflict", message).into_response(),
        AutofillOutcome::Failed(_) => {
            JsonApiError::new(StatusCode::BAD_GATEWAY, "Bad Gateway", message).into_response()
        }
        AutofillOutcome::NoData | AutofillOutcome::Filled(_) => StatusCode::NO_CONTENT.into_response(),
    }
}
