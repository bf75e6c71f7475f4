use std::fmt;

use serde_json::{Map, Value};
use uuid::Uuid;

use super::types::{Operation, Provider};

/// Opaque API credential. Never printed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials(String);

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(***)")
    }
}

/// A generation job addressed to one provider.
///
/// Fields are only readable once built; adapting a job for another provider
/// produces a new request via [`JobRequest::for_provider`].
#[derive(Debug, Clone)]
pub struct JobRequest {
    id: Uuid,
    provider: Provider,
    operation: Operation,
    payload: Map<String, Value>,
    credentials: Credentials,
}

impl JobRequest {
    pub fn new(provider: Provider, operation: Operation, payload: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            operation,
            payload,
            credentials: Credentials::default(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Copy of this job retargeted at another provider. Keeps the same id so
    /// log lines of a fallback chain correlate.
    pub fn for_provider(&self, provider: Provider, credentials: Credentials) -> Self {
        Self {
            id: self.id,
            provider,
            operation: self.operation,
            payload: self.payload.clone(),
            credentials,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(Value::as_str)
    }

    /// Checks the fields `operation` requires. Returns a human-readable
    /// message naming the first offending field.
    pub fn validate(&self) -> Result<(), String> {
        for field in self.operation.required_fields() {
            match self.payload.get(*field) {
                None | Some(Value::Null) => {
                    return Err(format!(
                        "missing required field `{field}` for {}",
                        self.operation
                    ));
                }
                Some(Value::String(s)) if !s.trim().is_empty() => {}
                Some(_) => {
                    return Err(format!("field `{field}` must be a non-empty string"));
                }
            }
        }
        Ok(())
    }
}
