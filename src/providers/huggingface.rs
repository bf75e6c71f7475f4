//! Hugging Face Inference API text-to-image.
//!
//! Success is a raw image body. A cold model answers HTTP 503 with
//! `{"error": "... is currently loading", "estimated_time": 20.0}`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

use super::{ProviderAdapter, join_url, structured_error_message};
use crate::classify::RawResponse;
use crate::error::Result;
use crate::job::{JobRequest, Operation, Provider};
use crate::transport::{Auth, HttpCall, ResponseBody, TransportResponse};

pub const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co/models";
pub const DEFAULT_MODEL: &str = "stabilityai/stable-diffusion-xl-base-1.0";

pub struct HuggingFaceAdapter {
    base_url: String,
}

impl HuggingFaceAdapter {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

impl ProviderAdapter for HuggingFaceAdapter {
    fn provider(&self) -> Provider {
        Provider::HuggingFace
    }

    fn supports(&self, operation: Operation) -> bool {
        operation == Operation::Text2Img
    }

    fn submit_call(&self, job: &JobRequest) -> Result<HttpCall> {
        let model = job
            .field_str("model")
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL);
        let url = join_url(&self.base_url, model)?;

        let mut parameters = serde_json::Map::new();
        if let Some(negative) = job.field_str("negative_prompt").filter(|s| !s.is_empty()) {
            parameters.insert("negative_prompt".into(), Value::String(negative.to_string()));
        }

        let body = json!({
            "inputs": job.field_str("prompt").unwrap_or_default(),
            "parameters": parameters,
        });
        Ok(HttpCall::new(
            url,
            Auth::Bearer(job.credentials().expose().to_string()),
            body,
        ))
    }

    fn normalize(&self, response: &TransportResponse) -> Option<RawResponse> {
        match &response.body {
            ResponseBody::Bytes { content_type, data } if !data.is_empty() => {
                let mime = if content_type.starts_with("image/") {
                    content_type.as_str()
                } else {
                    "image/png"
                };
                let encoded = STANDARD.encode(data);
                Some(RawResponse::success(
                    vec![format!("data:{mime};base64,{encoded}")],
                    0.0,
                ))
            }
            ResponseBody::Json(_) => {
                structured_error_message(&response.body).map(RawResponse::error)
            }
            _ => None,
        }
    }

    fn model_loading(&self, response: &TransportResponse) -> Option<f64> {
        if response.status != 503 {
            return None;
        }
        let body = response.body.as_json()?.as_object()?;
        let loading = body
            .get("error")
            .and_then(Value::as_str)
            .is_some_and(|e| e.to_ascii_lowercase().contains("loading"));
        let estimate = body.get("estimated_time").and_then(Value::as_f64);
        if loading || estimate.is_some() {
            Some(estimate.unwrap_or(0.0))
        } else {
            None
        }
    }
}
