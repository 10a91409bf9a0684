pub mod assets;
pub mod autofill;
pub mod calculator;
pub mod form;
pub mod records;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use common::types::{Health, ServiceStatus};
use serde::Serialize;
use service::records::StorageNotice;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cache_generation: state.assets.lifecycle().generation().to_string(),
        records: state.records.len().await,
    })
}

async fn metrics() -> impl IntoResponse {
    match offline_cache::observability::encode_metrics() {
        Ok(text) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            format!("metrics encode error: {e}"),
        ),
    }
}

/// A value plus the storage notice raised while persisting it, if any.
#[derive(Debug, Serialize)]
pub struct WithNotice<T> {
    #[serde(flatten)]
    pub value: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl<T> WithNotice<T> {
    pub fn new(value: T, notice: Option<StorageNotice>) -> Self {
        Self { value, notice: notice.map(|n| n.message()) }
    }
}

/// Build the full application router: records API, calculator, autofill, and
/// the offline asset cache as fallback for everything else.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let body_limit = state.body_limit();

    let api = Router::new()
        .route("/api/records", get(records::list).post(records::create))
        .route(
            "/api/records/:id",
            get(records::get_one).put(records::update).delete(records::delete_one),
        )
        .route(
            "/api/records/:id/photos/:slot",
            post(records::upload_photos)
                .layer(DefaultBodyLimit::disable())
                .delete(records::remove_photo),
        )
        .route("/api/autofill", post(autofill::autofill))
        .route(
            "/api/form",
            get(form::current).post(form::open_new).patch(form::set_fields).delete(form::cancel),
        )
        .route("/api/form/edit/:id", post(form::open_edit))
        .route(
            "/api/form/photos/:slot",
            post(form::upload_photos)
                .layer(DefaultBodyLimit::disable())
                .delete(form::remove_photo),
        )
        .route("/api/form/autofill", post(form::autofill))
        .route("/api/form/submit", post(form::submit))
        .route("/api/detail", get(form::detail).delete(form::close_detail))
        .route("/api/detail/:id", post(form::open_detail))
        .route("/api/calculator", get(calculator::state))
        .route("/api/calculator/keys", post(calculator::press));

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/metrics", get(metrics))
        .merge(api)
        .fallback(assets::intercept)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
