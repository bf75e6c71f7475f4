use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use super::types::Provider;
use crate::error::FailureKind;

/// What a submit or poll step produced.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Artifacts are ready (URLs or inline data URLs), in provider order.
    Immediate {
        artifacts: Vec<String>,
        elapsed_seconds: f64,
    },
    /// The provider accepted the job; results must be fetched from `poll_handle`.
    Pending {
        poll_handle: Url,
        eta_seconds: f64,
        job_id: String,
    },
    Failed {
        reason: String,
        is_retryable: bool,
        kind: FailureKind,
    },
}

impl JobOutcome {
    pub fn failed(kind: FailureKind, reason: impl Into<String>, is_retryable: bool) -> Self {
        JobOutcome::Failed {
            reason: reason.into(),
            is_retryable,
            kind,
        }
    }

    pub fn invalid_format() -> Self {
        Self::failed(FailureKind::MalformedResponse, "invalid response format", false)
    }

    pub fn timeout() -> Self {
        Self::failed(FailureKind::Timeout, "timeout", false)
    }

    pub fn cancelled() -> Self {
        Self::failed(FailureKind::Cancelled, "cancelled", false)
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self, JobOutcome::Immediate { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            JobOutcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Bookkeeping for one poll loop. Owned exclusively by that loop and dropped
/// when it terminates.
#[derive(Debug, Clone)]
pub struct PollState {
    handle: Url,
    attempts_made: u32,
    max_attempts: u32,
    interval_ms: u64,
    started_at: DateTime<Utc>,
}

impl PollState {
    pub fn new(handle: Url, max_attempts: u32, interval_ms: u64) -> Self {
        Self {
            handle,
            attempts_made: 0,
            max_attempts,
            interval_ms,
            started_at: Utc::now(),
        }
    }

    pub fn handle(&self) -> &Url {
        &self.handle
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Counts one attempt and returns the new total. Saturates at
    /// `max_attempts`.
    pub fn record_attempt(&mut self) -> u32 {
        if self.attempts_made < self.max_attempts {
            self.attempts_made += 1;
        }
        self.attempts_made
    }

    /// Switches to a new handle handed out by the provider mid-poll.
    pub fn follow(&mut self, handle: Url) {
        self.handle = handle;
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }

    pub fn elapsed_seconds(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Terminal result handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generation {
    pub provider: Provider,
    /// Index in the provider order that produced the result (0 = primary).
    pub fallback_position: usize,
    pub job_id: Option<String>,
    pub artifacts: Vec<String>,
    /// Wall-clock time from submit to result.
    pub elapsed_seconds: f64,
    /// Generation time reported by the provider, `0.0` when it sends none.
    pub provider_seconds: f64,
    pub poll_attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> Url {
        Url::parse("https://example.com/fetch/42").unwrap()
    }

    #[test]
    fn poll_state_never_exceeds_budget() {
        let mut state = PollState::new(handle(), 3, 10);
        assert_eq!(state.record_attempt(), 1);
        assert_eq!(state.record_attempt(), 2);
        assert!(!state.is_exhausted());
        assert_eq!(state.record_attempt(), 3);
        assert!(state.is_exhausted());
        assert_eq!(state.record_attempt(), 3);
        assert_eq!(state.attempts_made(), 3);
    }

    #[test]
    fn poll_state_interval() {
        let state = PollState::new(handle(), 30, 2000);
        assert_eq!(state.interval(), Duration::from_secs(2));
        assert_eq!(state.max_attempts(), 30);
        assert_eq!(state.handle().path(), "/fetch/42");
    }

    #[test]
    fn timeout_outcome_shape() {
        assert_eq!(
            JobOutcome::timeout(),
            JobOutcome::Failed {
                reason: "timeout".into(),
                is_retryable: false,
                kind: FailureKind::Timeout,
            }
        );
        assert_eq!(JobOutcome::timeout().failure_kind(), Some(FailureKind::Timeout));
    }

    #[test]
    fn generation_serializes_provider_name() {
        let generation = Generation {
            provider: Provider::Stability,
            fallback_position: 1,
            job_id: None,
            artifacts: vec!["https://out.png".into()],
            elapsed_seconds: 1.5,
            provider_seconds: 0.8,
            poll_attempts: 0,
        };
        let json = serde_json::to_value(&generation).unwrap();
        assert_eq!(json["provider"], "stability");
        assert_eq!(json["fallback_position"], 1);
        assert_eq!(json["provider_seconds"], 0.8);
    }
}
