use async_trait::async_trait;
use models::PartialRecord;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{AutofillError, Extractor};

const SCHEMA_FIELDS: [&str; 11] = [
    "customerName",
    "fatherName",
    "mobileNumber",
    "bikeNumber",
    "engineNumber",
    "chassisNumber",
    "permanentAddress",
    "correspondenceAddress",
    "bikeLocationAddress",
    "insuranceStart",
    "insuranceEnd",
];

/// Extractor backed by the Gemini `generateContent` endpoint with a JSON response schema.
#[derive(Clone)]
pub struct GeminiExtractor {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiExtractor {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn from_config(cfg: &configs::AutofillConfig) -> Self {
        Self::new(cfg.endpoint.clone(), cfg.model.clone(), cfg.api_key.clone())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint.trim_end_matches('/'), self.model)
    }
}

fn request_body(text: &str) -> Value {
    let properties: serde_json::Map<String, Value> = SCHEMA_FIELDS
        .iter()
        .map(|name| (name.to_string(), json!({ "type": "STRING" })))
        .collect();
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt(text) }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": { "type": "OBJECT", "properties": properties }
        }
    })
}

fn prompt(text: &str) -> String {
    format!(
        "Extract customer, vehicle and address details from this text: \"{text}\". \
         Use only values present in the text. Dates stay as written. Leave a field out when it is not mentioned."
    )
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Turn a `generateContent` response body into a partial record.
pub(crate) fn parse_response(body: &str) -> Result<Option<PartialRecord>, AutofillError> {
    let resp: GenerateResponse =
        serde_json::from_str(body).map_err(|e| AutofillError::InvalidResponse(e.to_string()))?;
    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Ok(None);
    }
    let partial: PartialRecord =
        serde_json::from_str(&text).map_err(|e| AutofillError::InvalidResponse(e.to_string()))?;
    Ok((!partial.is_empty()).then_some(partial))
}

#[async_trait]
impl Extractor for GeminiExtractor {
    async fn extract(&self, text: &str) -> Result<Option<PartialRecord>, AutofillError> {
        let api_key = self.api_key.as_deref().ok_or(AutofillError::NotConfigured)?;
        debug!(model = %self.model, chars = text.len(), "requesting extraction");
        let resp = self
            .client
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&request_body(text))
            .send()
            .await
            .map_err(|e| AutofillError::Request(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| AutofillError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(AutofillError::Request(format!("upstream returned {status}")));
        }
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(inner: &str) -> String {
        json!({ "candidates": [{ "content": { "parts": [{ "text": inner }] } }] }).to_string()
    }

    #[test]
    fn parses_schema_text() {
        let body = wrap(r#"{"customerName":"Asha","bikeNumber":"MH12AB1234","insuranceEnd":"2025-01-31"}"#);
        let partial = parse_response(&body).expect("parse").expect("data");
        assert_eq!(partial.customer_name.as_deref(), Some("Asha"));
        assert_eq!(partial.bike_number.as_deref(), Some("MH12AB1234"));
        assert_eq!(partial.insurance_end.as_deref(), Some("2025-01-31"));
        assert_eq!(partial.father_name, None);
    }

    #[test]
    fn empty_results_are_no_data() {
        assert_eq!(parse_response(r#"{"candidates":[]}"#), Ok(None));
        assert_eq!(parse_response(&wrap("")), Ok(None));
        assert_eq!(parse_response(&wrap(r#"{"customerName":""}"#)), Ok(None));
    }

    #[test]
    fn malformed_payloads_are_invalid() {
        assert!(matches!(parse_response("<html>"), Err(AutofillError::InvalidResponse(_))));
        assert!(matches!(parse_response(&wrap("not json")), Err(AutofillError::InvalidResponse(_))));
    }

    #[test]
    fn request_carries_schema_and_prompt() {
        let body = request_body("Ravi KA01");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        let props = body["generationConfig"]["responseSchema"]["properties"].as_object().expect("props");
        assert_eq!(props.len(), SCHEMA_FIELDS.len());
        assert!(props.contains_key("chassisNumber"));
        let text = body["contents"][0]["parts"][0]["text"].as_str().expect("prompt");
        assert!(text.contains("Ravi KA01"));
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let ex = GeminiExtractor::new("http://127.0.0.1:9", "m", Some("  ".into()));
        assert!(!ex.is_configured());
        assert_eq!(ex.extract("Asha").await, Err(AutofillError::NotConfigured));
    }

    #[test]
    fn url_joins_endpoint_and_model() {
        let ex = GeminiExtractor::new("https://example.test/v1beta/", "gemini-x", None);
        assert_eq!(ex.url(), "https://example.test/v1beta/models/gemini-x:generateContent");
    }
}
