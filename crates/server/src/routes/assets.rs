use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use offline_cache::{AssetRequest, AssetResponse};
use tracing::debug;

use crate::errors::JsonApiError;
use crate::state::AppState;

/// Headers that describe one hop, not the cached asset.
const HOP_BY_HOP: [&str; 6] = [
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
    "upgrade",
    "proxy-connection",
];

/// Fallback route: everything the API does not claim goes through the offline cache.
pub async fn intercept(State(state): State<AppState>, req: Request) -> Result<Response, JsonApiError> {
    let (parts, body) = req.into_parts();
    // absolute-form targets come from forward-proxy clients
    let url = if parts.uri.scheme().is_some() {
        parts.uri.to_string()
    } else {
        let target = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        state.assets.resolve(target)?
    };
    let body = to_bytes(body, state.body_limit())
        .await
        .map_err(|e| JsonApiError::bad_request(e.to_string()))?;

    debug!(method = %parts.method, %url, "asset request");
    let response = state
        .assets
        .handle(AssetRequest::new(parts.method.as_str(), url, body))
        .await?;
    Ok(into_http(response))
}

fn into_http(asset: AssetResponse) -> Response {
    let status = StatusCode::from_u16(asset.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = (status, Body::from(asset.body)).into_response();
    let headers = response.headers_mut();
    for (name, value) in asset.headers {
        if HOP_BY_HOP.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            headers.append(name, value);
        }
    }
    response
}
