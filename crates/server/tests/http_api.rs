use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use models::PartialRecord;
use offline_cache::{AssetRequest, AssetResponse, FetchError, Fetcher, MemoryCacheStorage};
use serde_json::{json, Value};
use server::{routes, AppState, Backends};
use service::autofill::{AutofillError, Extractor};
use service::storage::MemoryKv;
use tower::ServiceExt;

const ORIGIN: &str = "http://127.0.0.1:5173";

struct Scripted(Result<Option<PartialRecord>, AutofillError>);

#[async_trait]
impl Extractor for Scripted {
    async fn extract(&self, _text: &str) -> Result<Option<PartialRecord>, AutofillError> {
        self.0.clone()
    }
}

#[derive(Default)]
struct Network {
    offline: AtomicBool,
}

#[async_trait]
impl Fetcher for Network {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, FetchError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network("offline".into()));
        }
        Ok(AssetResponse::new(200, format!("net:{}", request.url)).with_header("content-type", "text/plain"))
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    network: Arc<Network>,
}

async fn build_app(kv: MemoryKv, extractor: Scripted) -> anyhow::Result<TestApp> {
    let mut cfg = configs::AppConfig::default();
    cfg.uploads.max_file_bytes = 64;
    cfg.cache.generation = "test-v1".into();
    cfg.cache.origin = ORIGIN.into();
    cfg.cache.manifest = vec!["./index.html".into()];
    cfg.normalize_and_validate()?;

    let network = Arc::new(Network::default());
    let backends = Backends {
        kv: Arc::new(kv),
        extractor: Arc::new(extractor),
        cache_storage: Arc::new(MemoryCacheStorage::new(32)),
        fetcher: network.clone(),
    };
    let state = AppState::build(&cfg, backends).await?;
    let router = routes::build_router(state.clone(), tower_http::cors::CorsLayer::very_permissive());
    Ok(TestApp { router, state, network })
}

async fn default_app() -> anyhow::Result<TestApp> {
    build_app(MemoryKv::new(), Scripted(Ok(None))).await
}

async fn send(app: &TestApp, req: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
    let resp = app.router.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    Ok((status, body))
}

fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

#[tokio::test]
async fn health_and_status() -> anyhow::Result<()> {
    let app = default_app().await?;
    let (status, body) = send(&app, get("/health")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, get("/status")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache_generation"], "test-v1");
    assert_eq!(body["records"], 0);
    Ok(())
}

#[tokio::test]
async fn record_crud_and_search() -> anyhow::Result<()> {
    let app = default_app().await?;

    let (status, asha) = send(
        &app,
        json_req("POST", "/api/records", json!({"customerName": "Asha", "bikeNumber": "MH12AB1234"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert!(asha.get("notice").is_none());
    let asha_id = asha["id"].as_str().expect("id").to_string();

    let (_, ravi) = send(&app, json_req("POST", "/api/records", json!({"customerName": "Ravi"}))).await?;
    let ravi_id = ravi["id"].as_str().expect("id").to_string();

    let (_, all) = send(&app, get("/api/records")).await?;
    let ids: Vec<_> = all.as_array().expect("array").iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!(ravi_id), json!(asha_id)]);

    let (_, hits) = send(&app, get("/api/records?q=ASHA")).await?;
    assert_eq!(hits.as_array().map(Vec::len), Some(1));
    let (_, none) = send(&app, get("/api/records?q=zz")).await?;
    assert_eq!(none.as_array().map(Vec::len), Some(0));

    let (status, updated) = send(
        &app,
        json_req("PUT", &format!("/api/records/{asha_id}"), json!({"customerName": "Asha K", "bikeNumber": "MH12AB1234"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], json!(asha_id));
    assert_eq!(updated["customerName"], "Asha K");

    let del = Request::builder().method("DELETE").uri(format!("/api/records/{asha_id}")).body(Body::empty())?;
    let (status, body) = send(&app, del).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, body) = send(&app, get(&format!("/api/records/{asha_id}"))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");

    let (status, _) = send(&app, json_req("PUT", "/api/records/missing", json!({}))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

fn multipart(uri: &str, files: &[(&str, Vec<u8>)]) -> Request<Body> {
    let boundary = "----vkboundary";
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n").as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .expect("request")
}

#[tokio::test]
async fn oversized_photo_is_rejected_alone() -> anyhow::Result<()> {
    let app = default_app().await?;
    let (_, rec) = send(&app, json_req("POST", "/api/records", json!({"customerName": "Asha"}))).await?;
    let id = rec["id"].as_str().expect("id").to_string();

    let uri = format!("/api/records/{id}/photos/kycPhotos");
    let (status, report) = send(&app, multipart(&uri, &[("big.png", vec![7; 65]), ("ok.png", vec![1, 2, 3])])).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["accepted"], 1);
    assert_eq!(report["rejected"][0]["fileName"], "big.png");

    let (_, saved) = send(&app, get(&format!("/api/records/{id}"))).await?;
    assert_eq!(saved["kycPhotos"], json!(["data:image/png;base64,AQID"]));

    let del = Request::builder()
        .method("DELETE")
        .uri(format!("/api/records/{id}/photos/kycPhotos?index=0"))
        .body(Body::empty())?;
    let (_, removed) = send(&app, del).await?;
    assert_eq!(removed["removed"], true);

    let (status, _) = send(&app, multipart(&format!("/api/records/{id}/photos/selfie"), &[])).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, multipart("/api/records/nope/photos/kycPhotos", &[("a.png", vec![1])])).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn photo_larger_than_the_body_limit_is_rejected_alone() -> anyhow::Result<()> {
    let app = default_app().await?;
    let big = 3 * 1024 * 1024;
    assert!(big > app.state.body_limit());
    let (_, rec) = send(&app, json_req("POST", "/api/records", json!({"customerName": "Asha"}))).await?;
    let id = rec["id"].as_str().expect("id").to_string();

    let uri = format!("/api/records/{id}/photos/kycPhotos");
    let (status, report) = send(&app, multipart(&uri, &[("scan.png", vec![9; big]), ("ok.png", vec![1, 2, 3])])).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["accepted"], 1);
    assert_eq!(report["rejected"][0]["fileName"], "scan.png");
    assert_eq!(report["rejected"][0]["size"], big);

    let (_, saved) = send(&app, get(&format!("/api/records/{id}"))).await?;
    assert_eq!(saved["kycPhotos"], json!(["data:image/png;base64,AQID"]));

    // other routes keep the limit
    let oversized_json = json!({"customerName": "x".repeat(big)});
    let resp = app.router.clone().oneshot(json_req("POST", "/api/records", oversized_json)).await?;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}

#[tokio::test]
async fn storage_full_is_reported_with_the_value() -> anyhow::Result<()> {
    let app = build_app(MemoryKv::with_quota(200), Scripted(Ok(None))).await?;
    let (status, body) = send(
        &app,
        json_req("POST", "/api/records", json!({"customerName": "Asha", "permanentAddress": "x".repeat(400)})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["notice"], "Storage full! Please delete some old entries with photos.");
    assert_eq!(app.state.records.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn autofill_status_codes() -> anyhow::Result<()> {
    let app = default_app().await?;
    let (status, _) = send(&app, json_req("POST", "/api/autofill", json!({"text": "hello"}))).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let found = PartialRecord { customer_name: Some("Asha".into()), ..Default::default() };
    let app = build_app(MemoryKv::new(), Scripted(Ok(Some(found)))).await?;
    let (status, body) = send(&app, json_req("POST", "/api/autofill", json!({"text": "Asha"}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customerName"], "Asha");

    let app = build_app(MemoryKv::new(), Scripted(Err(AutofillError::Request("down".into())))).await?;
    let (status, body) = send(&app, json_req("POST", "/api/autofill", json!({"text": "Asha"}))).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["message"], "Could not extract data. Check your connection and try again.");
    Ok(())
}

#[tokio::test]
async fn entry_form_session_fills_and_submits() -> anyhow::Result<()> {
    let found = PartialRecord {
        father_name: Some("Suresh".into()),
        mobile_number: Some("".into()),
        bike_number: Some("MH12AB1234".into()),
        ..Default::default()
    };
    let app = build_app(MemoryKv::new(), Scripted(Ok(Some(found)))).await?;

    let (status, _) = send(&app, json_req("PATCH", "/api/form", json!({"customerName": "Asha"}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, json_req("POST", "/api/form/autofill", json!({"text": "Asha"}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, form) = send(&app, json_req("POST", "/api/form", json!({}))).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(form["editing"], Value::Null);

    let (status, _) = send(&app, json_req("PATCH", "/api/form", json!({"nickname": "A"}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, form) =
        send(&app, json_req("PATCH", "/api/form", json!({"customerName": "Asha", "mobileNumber": "98"}))).await?;
    assert_eq!(form["draft"]["customerName"], "Asha");

    let (_, report) = send(&app, multipart("/api/form/photos/kycPhotos", &[("k.png", vec![1, 2, 3]), ("big.png", vec![0; 65])])).await?;
    assert_eq!(report["accepted"], 1);
    assert_eq!(report["rejected"][0]["fileName"], "big.png");

    let (status, form) = send(&app, json_req("POST", "/api/form/autofill", json!({"text": "Asha s/o Suresh MH12AB1234"}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(form["draft"]["fatherName"], "Suresh");
    assert_eq!(form["draft"]["mobileNumber"], "98");
    assert_eq!(form["draft"]["bikeNumber"], "MH12AB1234");

    let (status, saved) = send(&app, json_req("POST", "/api/form/submit", json!({}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["kycPhotos"], json!(["data:image/png;base64,AQID"]));
    let (status, _) = send(&app, get("/api/form")).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.state.records.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn deleting_the_viewed_record_closes_the_detail_view() -> anyhow::Result<()> {
    let app = default_app().await?;
    let (_, a) = send(&app, json_req("POST", "/api/records", json!({"customerName": "Asha"}))).await?;
    let (_, b) = send(&app, json_req("POST", "/api/records", json!({"customerName": "Ravi"}))).await?;
    let (a_id, b_id) = (a["id"].as_str().expect("id").to_string(), b["id"].as_str().expect("id").to_string());

    let (status, shown) = send(&app, json_req("POST", &format!("/api/detail/{b_id}"), json!({}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shown["customerName"], "Ravi");

    let del = |id: &str| Request::builder().method("DELETE").uri(format!("/api/records/{id}")).body(Body::empty());
    send(&app, del(&a_id)?).await?;
    let (_, view) = send(&app, get("/api/detail")).await?;
    assert_eq!(view["id"], json!(b_id));

    send(&app, del(&b_id)?).await?;
    let (_, view) = send(&app, get("/api/detail")).await?;
    assert_eq!(view["id"], Value::Null);

    let (status, _) = send(&app, json_req("POST", "/api/detail/missing", json!({}))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn calculator_presses_persist() -> anyhow::Result<()> {
    let app = default_app().await?;
    for key in ["1", "2", "+", "3"] {
        let (status, _) = send(&app, json_req("POST", "/api/calculator/keys", json!({"key": key}))).await?;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, state) = send(&app, json_req("POST", "/api/calculator/keys", json!({"key": "="}))).await?;
    assert_eq!(state["display"], "15");

    let (_, state) = send(&app, get("/api/calculator")).await?;
    assert_eq!(state["display"], "15");
    assert_eq!(state["shouldReset"], true);

    let (status, _) = send(&app, json_req("POST", "/api/calculator/keys", json!({"key": "sqrt"}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn unmatched_paths_go_through_the_asset_cache() -> anyhow::Result<()> {
    let app = default_app().await?;
    app.state.assets.start().await?;

    let resp = app.router.clone().oneshot(get("/index.html")).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "text/plain");
    let bytes = to_bytes(resp.into_body(), usize::MAX).await?;
    assert_eq!(&bytes[..], format!("net:{ORIGIN}/index.html").as_bytes());

    app.network.offline.store(true, Ordering::SeqCst);
    // pre-cached shell still answers
    let resp = app.router.clone().oneshot(get("/index.html")).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let (status, body) = send(&app, get("https://cdn.example.com/lib.js")).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Bad Gateway");
    Ok(())
}
