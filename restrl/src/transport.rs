//! HTTP transport boundary.
//!
//! The engine only needs `send(plan) → Option<ApiResponse>`: a transport
//! failure (malformed request, connection refused, timeout) yields `None`,
//! which the reward tables score as the worst outcome. Errors never escape
//! an iteration.

use crate::request::{BodyPayload, RequestPlan};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Minimal response view the engine scores and mines.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status_code: u16,
    pub text: String,
}

impl ApiResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Body parsed as JSON, if it is JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.text).ok()
    }
}

/// Wire-level client boundary.
pub trait HttpTransport {
    fn send(&self, plan: &RequestPlan) -> Option<ApiResponse>;
}

/// Blocking reqwest transport against a fixed base URL.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, String> {
        let parsed = url::Url::parse(base_url).map_err(|e| format!("invalid base URL: {}", e))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("failed to create HTTP client: {}", e))?;
        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, plan: &RequestPlan) -> Option<ApiResponse> {
        let url = format!("{}{}", self.base_url, plan.path);
        let method = reqwest::Method::from_bytes(plan.method.as_str().to_uppercase().as_bytes())
            .unwrap_or(reqwest::Method::GET);

        let mut request = self.client.request(method, &url).query(&plan.query);
        for (name, value) in &plan.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        request = match &plan.body {
            Some(BodyPayload::Json(value)) => request.json(value),
            Some(BodyPayload::Form(fields)) => {
                let pairs: Vec<(&str, &str)> = fields
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                request.form(&pairs)
            }
            Some(BodyPayload::Multipart(value)) => {
                let serialized = value.to_string();
                let part = reqwest::blocking::multipart::Part::bytes(serialized.into_bytes())
                    .file_name("file.txt")
                    .mime_str("application/json")
                    .ok()?;
                let form = reqwest::blocking::multipart::Form::new()
                    .part("file", part)
                    .text("metadata", "metadata");
                request.multipart(form)
            }
            Some(BodyPayload::Text(text)) => request.body(text.clone()),
            None => request,
        };

        match request.send() {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let text = response.text().unwrap_or_default();
                debug!(operation = %plan.operation_id, status = status_code, "response received");
                Some(ApiResponse { status_code, text })
            }
            Err(err) => {
                warn!(operation = %plan.operation_id, error = %err, "request failed");
                None
            }
        }
    }
}
