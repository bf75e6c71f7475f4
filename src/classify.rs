//! Response classification shared by every provider.
//!
//! Adapters normalize their provider's body into a [`RawResponse`]; the
//! functions here decide between immediate success, a pending handle and a
//! failure. Both functions are pure: the same input always yields the same
//! [`JobOutcome`].

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::FailureKind;
use crate::job::JobOutcome;

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_PROCESSING: &str = "processing";

/// Common response shape: `{status, output?, future_links?, message?,
/// fetch_result?, eta?, id?, generationTime?}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Option<Vec<String>>,
    #[serde(default)]
    pub future_links: Option<Vec<String>>,
    #[serde(default, alias = "messege")]
    pub message: Option<Value>,
    #[serde(default)]
    pub fetch_result: Option<String>,
    #[serde(default)]
    pub eta: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "generationTime")]
    pub generation_time: Option<Value>,
}

impl RawResponse {
    /// Parses a JSON body. `None` when the body is not an object of the
    /// expected shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn success(artifacts: Vec<String>, elapsed_seconds: f64) -> Self {
        Self {
            status: Some(STATUS_SUCCESS.to_string()),
            output: Some(artifacts),
            generation_time: Some(Value::from(elapsed_seconds)),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Some("error".to_string()),
            message: Some(Value::String(message.into())),
            ..Self::default()
        }
    }

    fn status_is(&self, expected: &str) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(expected))
    }

    fn is_declared_failure(&self) -> bool {
        self.status_is("failed") || self.status_is("error")
    }

    fn job_id(&self) -> String {
        match &self.id {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    fn failure_message(&self) -> String {
        match &self.message {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Null) | None => format!(
                "provider reported status {}",
                self.status.as_deref().unwrap_or("unknown")
            ),
            Some(other) => other.to_string(),
        }
    }
}

/// Extra rules an adapter may enable when classifying poll responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollRules {
    /// Treat populated `future_links` as success even without a "success"
    /// status. Some providers fill the links before flipping the status.
    pub future_links_as_success: bool,
}

/// Classifies a submit response.
pub fn classify(raw: &RawResponse) -> JobOutcome {
    if raw.status_is(STATUS_SUCCESS)
        && let Some(output) = raw.output.as_ref().filter(|o| !o.is_empty())
    {
        return JobOutcome::Immediate {
            artifacts: output.clone(),
            elapsed_seconds: seconds(raw.generation_time.as_ref()),
        };
    }

    if raw.status_is(STATUS_PROCESSING)
        && let Some(handle) = raw.fetch_result.as_deref()
    {
        return pending(raw, handle);
    }

    if raw.is_declared_failure() {
        return JobOutcome::failed(FailureKind::ProviderDeclared, raw.failure_message(), false);
    }

    JobOutcome::invalid_format()
}

/// Classifies a response fetched from `current_handle`.
///
/// Same rule as [`classify`], except that a "processing" response without a
/// fresh `fetch_result` keeps polling the current handle, and `rules` may
/// turn populated future links into a synthetic success.
pub fn classify_poll(raw: &RawResponse, current_handle: &Url, rules: PollRules) -> JobOutcome {
    if rules.future_links_as_success
        && !raw.status_is(STATUS_SUCCESS)
        && !raw.is_declared_failure()
        && let Some(links) = raw.future_links.as_ref().filter(|l| !l.is_empty())
    {
        return JobOutcome::Immediate {
            artifacts: links.clone(),
            elapsed_seconds: seconds(raw.generation_time.as_ref()),
        };
    }

    if raw.status_is(STATUS_PROCESSING) && raw.fetch_result.is_none() {
        return JobOutcome::Pending {
            poll_handle: current_handle.clone(),
            eta_seconds: seconds(raw.eta.as_ref()),
            job_id: raw.job_id(),
        };
    }

    classify(raw)
}

/// Classifies an arbitrary JSON body with [`classify`].
pub fn classify_value(body: &Value) -> JobOutcome {
    match RawResponse::from_value(body) {
        Some(raw) => classify(&raw),
        None => JobOutcome::invalid_format(),
    }
}

fn pending(raw: &RawResponse, handle: &str) -> JobOutcome {
    match Url::parse(handle) {
        Ok(poll_handle) => JobOutcome::Pending {
            poll_handle,
            eta_seconds: seconds(raw.eta.as_ref()),
            job_id: raw.job_id(),
        },
        Err(_) => JobOutcome::invalid_format(),
    }
}

// Providers send timings as numbers or numeric strings.
fn seconds(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}
