//! Stability AI text-to-image. Answers synchronously with base64 artifacts.

use serde::Deserialize;
use serde_json::json;

use super::{ProviderAdapter, join_url, numeric_field};
use crate::classify::RawResponse;
use crate::error::Result;
use crate::job::{JobRequest, Operation, Provider};
use crate::transport::{Auth, HttpCall, TransportResponse};

pub const DEFAULT_BASE_URL: &str =
    "https://api.stability.ai/v1/generation/stable-diffusion-xl-1024-v1-0";

pub struct StabilityAdapter {
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    base64: String,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

impl StabilityAdapter {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

impl ProviderAdapter for StabilityAdapter {
    fn provider(&self) -> Provider {
        Provider::Stability
    }

    fn supports(&self, operation: Operation) -> bool {
        operation == Operation::Text2Img
    }

    fn submit_call(&self, job: &JobRequest) -> Result<HttpCall> {
        let url = join_url(&self.base_url, "text-to-image")?;

        let mut prompts = vec![json!({
            "text": job.field_str("prompt").unwrap_or_default(),
            "weight": 1,
        })];
        if let Some(negative) = job.field_str("negative_prompt").filter(|s| !s.is_empty()) {
            prompts.push(json!({ "text": negative, "weight": -1 }));
        }

        let body = json!({
            "text_prompts": prompts,
            "cfg_scale": 7,
            "width": numeric_field(job, "width").unwrap_or(1024),
            "height": numeric_field(job, "height").unwrap_or(1024),
            "samples": numeric_field(job, "samples").unwrap_or(1),
            "steps": 30,
        });

        Ok(HttpCall::new(
            url,
            Auth::Bearer(job.credentials().expose().to_string()),
            body,
        ))
    }

    fn normalize(&self, response: &TransportResponse) -> Option<RawResponse> {
        let parsed: GenerationResponse =
            serde_json::from_value(response.body.as_json()?.clone()).ok()?;

        // Filtered images come back with an ERROR finish reason.
        let artifacts: Vec<String> = parsed
            .artifacts
            .into_iter()
            .filter(|a| a.finish_reason.as_deref() != Some("ERROR"))
            .map(|a| format!("data:image/png;base64,{}", a.base64))
            .collect();

        if artifacts.is_empty() {
            return Some(RawResponse::error("no usable artifacts returned"));
        }
        Some(RawResponse::success(artifacts, 0.0))
    }
}
