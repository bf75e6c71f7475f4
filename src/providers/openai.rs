//! OpenAI chat completions. Single provider, no polling.

use serde::Deserialize;
use serde_json::{Value, json};

use super::{ProviderAdapter, join_url, structured_error_message};
use crate::classify::RawResponse;
use crate::error::Result;
use crate::job::{JobRequest, Operation, Provider};
use crate::transport::{Auth, HttpCall, TransportResponse};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAiAdapter {
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiAdapter {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

impl ProviderAdapter for OpenAiAdapter {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn supports(&self, operation: Operation) -> bool {
        operation == Operation::Chat
    }

    fn submit_call(&self, job: &JobRequest) -> Result<HttpCall> {
        let url = join_url(&self.base_url, "chat/completions")?;

        let mut messages = Vec::new();
        if let Some(system) = job.field_str("system").filter(|s| !s.is_empty()) {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({
            "role": "user",
            "content": job.field_str("prompt").unwrap_or_default(),
        }));

        let mut body = json!({
            "model": job.field_str("model").unwrap_or(DEFAULT_MODEL),
            "messages": messages,
        });
        if let Some(temperature) = job.payload().get("temperature").and_then(Value::as_f64) {
            body["temperature"] = json!(temperature);
        }

        Ok(HttpCall::new(
            url,
            Auth::Bearer(job.credentials().expose().to_string()),
            body,
        ))
    }

    fn normalize(&self, response: &TransportResponse) -> Option<RawResponse> {
        let body = response.body.as_json()?;
        if let Ok(parsed) = serde_json::from_value::<ChatResponse>(body.clone()) {
            let content: Vec<String> = parsed
                .choices
                .into_iter()
                .filter_map(|c| c.message.content)
                .filter(|c| !c.is_empty())
                .take(1)
                .collect();
            return Some(if content.is_empty() {
                RawResponse::error("empty completion")
            } else {
                RawResponse::success(content, 0.0)
            });
        }
        structured_error_message(&response.body).map(RawResponse::error)
    }
}
