//! Provider adapters.
//!
//! Each adapter knows one provider's URLs, auth, payload shape and response
//! shape. Everything else (HTTP status handling, classification, polling,
//! fallback) is shared and lives outside this module.

use std::collections::HashMap;

use serde_json::{Map, Value};
use url::Url;

use crate::classify::{self, PollRules, RawResponse};
use crate::config::GenflowConfig;
use crate::error::{FailureKind, GenflowError, Result};
use crate::job::{Credentials, JobOutcome, JobRequest, Operation, Provider};
use crate::transport::{Auth, HttpCall, ResponseBody, TransportResponse};

pub mod huggingface;
pub mod modelslab;
pub mod openai;
pub mod stability;

pub use huggingface::HuggingFaceAdapter;
pub use modelslab::ModelsLabAdapter;
pub use openai::OpenAiAdapter;
pub use stability::StabilityAdapter;

/// What the poller does when a poll request fails at the transport level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorPolicy {
    /// The first transport error ends the poll.
    FailFast,
    /// The error uses up an attempt and polling continues; only an error on
    /// the final attempt is surfaced.
    CountAsAttempt,
}

pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    fn supports(&self, operation: Operation) -> bool;

    /// Builds the initial request. The job has already been validated.
    fn submit_call(&self, job: &JobRequest) -> Result<HttpCall>;

    /// Maps a 2xx response into the common shape. `None` means the body is
    /// not something this provider sends.
    fn normalize(&self, response: &TransportResponse) -> Option<RawResponse>;

    fn poll_call(&self, handle: &Url, _credentials: &Credentials) -> HttpCall {
        HttpCall::new(handle.clone(), Auth::None, Value::Object(Map::new()))
    }

    fn poll_rules(&self, _operation: Operation) -> PollRules {
        PollRules::default()
    }

    fn transport_error_policy(&self, _operation: Operation) -> TransportErrorPolicy {
        TransportErrorPolicy::CountAsAttempt
    }

    /// Detects a "model is loading" reply. Returns the provider's estimate
    /// in seconds, or `Some(0.0)` when it gives none.
    fn model_loading(&self, _response: &TransportResponse) -> Option<f64> {
        None
    }
}

/// Which classification rule applies to a response.
#[derive(Debug, Clone, Copy)]
pub enum Stage<'a> {
    Submit,
    Poll { handle: &'a Url, rules: PollRules },
}

/// Turns an HTTP response into an outcome: status code handling first, then
/// the adapter's normalization and the shared classifier.
pub fn interpret(
    adapter: &dyn ProviderAdapter,
    response: &TransportResponse,
    stage: Stage<'_>,
) -> JobOutcome {
    if let Some(eta) = adapter.model_loading(response) {
        return JobOutcome::failed(
            FailureKind::ModelLoading,
            format!("model is loading (estimated {eta:.0}s)"),
            true,
        );
    }

    let status = response.status;
    if status >= 500 {
        return JobOutcome::failed(
            FailureKind::Transport,
            format!("HTTP {status}{}", detail_suffix(&response.body)),
            true,
        );
    }
    if (400..500).contains(&status) {
        return match structured_error_message(&response.body) {
            Some(message) => JobOutcome::failed(
                FailureKind::ProviderDeclared,
                format!("HTTP {status}: {message}"),
                false,
            ),
            None => JobOutcome::failed(FailureKind::Transport, format!("HTTP {status}"), false),
        };
    }
    if !response.is_success() {
        return JobOutcome::failed(FailureKind::Transport, format!("HTTP {status}"), false);
    }

    let Some(raw) = adapter.normalize(response) else {
        return JobOutcome::invalid_format();
    };
    match stage {
        Stage::Submit => classify::classify(&raw),
        Stage::Poll { handle, rules } => classify::classify_poll(&raw, handle, rules),
    }
}

/// Extracts a provider error message from common error body layouts:
/// `{message}`, `{error: "..."}`, `{error: {message}}`, `{detail}`.
pub fn structured_error_message(body: &ResponseBody) -> Option<String> {
    let object = body.as_json()?.as_object()?;
    let pick = |v: &Value| v.as_str().filter(|s| !s.is_empty()).map(str::to_string);

    object
        .get("message")
        .or_else(|| object.get("messege"))
        .and_then(pick)
        .or_else(|| match object.get("error") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Object(inner)) => inner.get("message").and_then(pick),
            _ => None,
        })
        .or_else(|| object.get("detail").and_then(pick))
}

fn detail_suffix(body: &ResponseBody) -> String {
    structured_error_message(body)
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

pub(crate) fn join_url(base: &str, path: &str) -> Result<Url> {
    let joined = if path.is_empty() {
        base.trim_end_matches('/').to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
    };
    Url::parse(&joined).map_err(|e| GenflowError::Config(format!("invalid provider URL {joined}: {e}")))
}

/// Reads a numeric payload field sent either as a number or a string.
pub(crate) fn numeric_field(job: &JobRequest, name: &str) -> Option<u64> {
    match job.payload().get(name)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Adapters keyed by provider, built once from configuration.
pub struct ProviderRegistry {
    adapters: HashMap<Provider, Box<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn from_config(config: &GenflowConfig) -> Self {
        let base = |p: Provider| config.providers.get(p).base_url.clone();
        let mut registry = Self::empty();
        registry.register(Box::new(ModelsLabAdapter::new(base(Provider::ModelsLab))));
        registry.register(Box::new(StabilityAdapter::new(base(Provider::Stability))));
        registry.register(Box::new(HuggingFaceAdapter::new(base(Provider::HuggingFace))));
        registry.register(Box::new(OpenAiAdapter::new(base(Provider::OpenAi))));
        registry
    }

    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Box<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    pub fn get(&self, provider: Provider) -> Result<&dyn ProviderAdapter> {
        self.adapters
            .get(&provider)
            .map(|a| a.as_ref())
            .ok_or_else(|| GenflowError::Config(format!("no adapter registered for {provider}")))
    }

    /// Adapter for `provider`, checked against `operation`.
    pub fn for_operation(&self, provider: Provider, operation: Operation) -> Result<&dyn ProviderAdapter> {
        let adapter = self.get(provider)?;
        if !adapter.supports(operation) {
            return Err(GenflowError::Validation(format!(
                "{provider} does not support {operation}"
            )));
        }
        Ok(adapter)
    }
}
