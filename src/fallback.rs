//! Provider fallback for image generation.
//!
//! [`FallbackSequencer`] walks an ordered provider chain. Each provider gets
//! one submit (repeated with exponential backoff while the provider reports
//! that its model is loading) and, if the job is asynchronous, a poll loop.
//! Transport-level failures, whether raised by the submit or by the poll
//! loop, move on to the next provider; provider-declared failures, timeouts
//! and malformed responses are returned as they are.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{FallbackSettings, PollSettings};
use crate::error::FailureKind;
use crate::job::{Credentials, JobOutcome, JobRequest, Provider};
use crate::poll::{Poller, ProgressObserver};
use crate::providers::{ProviderAdapter, ProviderRegistry};
use crate::submit::Submitter;
use crate::transport::Transport;

/// Configuration for retry behavior while a model warms up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Submits per provider, including the first.
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2000,
        }
    }
}

impl From<&FallbackSettings> for BackoffConfig {
    fn from(settings: &FallbackSettings) -> Self {
        Self {
            max_attempts: settings.model_loading_attempts,
            base_delay_ms: settings.model_loading_base_delay_ms,
        }
    }
}

impl BackoffConfig {
    /// A single submit, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
        }
    }

    /// Calculate the delay after a given attempt using exponential backoff.
    /// delay = base_delay_ms * 2^(attempt - 1)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        self.base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// What one provider produced for a job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRun {
    pub provider: Provider,
    /// Index in the chain (0 = primary).
    pub position: usize,
    /// `Immediate` or `Failed`; never `Pending`.
    pub outcome: JobOutcome,
    pub poll_attempts: u32,
    pub job_id: Option<String>,
}

pub struct FallbackSequencer<'a, T: Transport> {
    transport: &'a T,
    registry: &'a ProviderRegistry,
    poll: PollSettings,
    backoff: BackoffConfig,
}

impl<'a, T: Transport> FallbackSequencer<'a, T> {
    pub fn new(
        transport: &'a T,
        registry: &'a ProviderRegistry,
        poll: PollSettings,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            poll,
            backoff,
        }
    }

    /// Tries each provider of `chain` in order and returns the first success.
    ///
    /// When every provider fails over, the result is the last provider's
    /// failure with the chain summarized in its reason.
    pub async fn generate_with_fallback(
        &self,
        job: &JobRequest,
        chain: &[(Provider, Credentials)],
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
    ) -> ProviderRun {
        let first = chain.first().map(|(p, _)| *p).unwrap_or(job.provider());
        if let Err(reason) = job.validate() {
            return ProviderRun {
                provider: first,
                position: 0,
                outcome: JobOutcome::failed(FailureKind::Validation, reason, false),
                poll_attempts: 0,
                job_id: None,
            };
        }

        let mut last: Option<ProviderRun> = None;
        let mut tried = 0;
        for (position, (provider, credentials)) in chain.iter().enumerate() {
            let adapter = match self.registry.for_operation(*provider, job.operation()) {
                Ok(adapter) => adapter,
                Err(e) => {
                    warn!(job = %job.id(), %provider, error = %e, "skipping provider");
                    continue;
                }
            };

            if let Some(previous) = &last {
                let reason = failure_reason(&previous.outcome);
                info!(job = %job.id(), from = %previous.provider, to = %provider, %reason, "falling back");
                observer.on_fallback(previous.provider, *provider, reason);
            }

            tried += 1;
            let attempt = job.for_provider(*provider, credentials.clone());
            let run = self
                .attempt_provider(adapter, &attempt, position, cancel, observer)
                .await;

            match run.outcome.failure_kind() {
                None => return run,
                Some(kind) if kind.allows_fallback() => last = Some(run),
                Some(_) => return run,
            }
        }

        match last {
            Some(run) => {
                let (reason, is_retryable, kind) = match run.outcome {
                    JobOutcome::Failed {
                        reason,
                        is_retryable,
                        kind,
                    } => (reason, is_retryable, kind),
                    other => (format!("{other:?}"), false, FailureKind::Transport),
                };
                ProviderRun {
                    outcome: JobOutcome::Failed {
                        reason: format!(
                            "all {tried} providers failed; last error from {}: {reason}",
                            run.provider
                        ),
                        is_retryable,
                        kind,
                    },
                    ..run
                }
            }
            None => ProviderRun {
                provider: first,
                position: 0,
                outcome: JobOutcome::failed(
                    FailureKind::Validation,
                    format!("no provider in the chain supports {}", job.operation()),
                    false,
                ),
                poll_attempts: 0,
                job_id: None,
            },
        }
    }

    /// Runs one provider to a terminal outcome: submit (with model-loading
    /// backoff) and, for asynchronous jobs, poll.
    pub async fn attempt_provider(
        &self,
        adapter: &dyn ProviderAdapter,
        job: &JobRequest,
        position: usize,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
    ) -> ProviderRun {
        let provider = adapter.provider();
        let submitter = Submitter::new(self.transport);
        observer.on_submit(provider);

        let mut attempt = 0;
        let submitted = loop {
            attempt += 1;
            let outcome = submitter.submit(adapter, job, cancel).await;
            if outcome.failure_kind() == Some(FailureKind::ModelLoading)
                && attempt < self.backoff.max_attempts
            {
                let delay_ms = self.backoff.delay_for_attempt(attempt);
                info!(
                    job = %job.id(),
                    %provider,
                    attempt,
                    max = self.backoff.max_attempts,
                    delay_ms,
                    "model loading, backing off"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return ProviderRun {
                            provider,
                            position,
                            outcome: JobOutcome::cancelled(),
                            poll_attempts: 0,
                            job_id: None,
                        };
                    }
                    _ = sleep(Duration::from_millis(delay_ms)) => {}
                }
                continue;
            }
            break outcome;
        };

        match submitted {
            JobOutcome::Pending {
                poll_handle,
                eta_seconds,
                job_id,
            } => {
                info!(job = %job.id(), %provider, provider_job = %job_id, eta_seconds, "job pending, polling");
                let polled = Poller::new(self.transport, self.poll.max_attempts, self.poll.interval_ms)
                    .poll(adapter, job, poll_handle, eta_seconds, cancel, observer)
                    .await;
                ProviderRun {
                    provider,
                    position,
                    outcome: polled.outcome,
                    poll_attempts: polled.attempts,
                    job_id: Some(job_id).filter(|id| !id.is_empty()),
                }
            }
            outcome => ProviderRun {
                provider,
                position,
                outcome,
                poll_attempts: 0,
                job_id: None,
            },
        }
    }
}

fn failure_reason(outcome: &JobOutcome) -> &str {
    match outcome {
        JobOutcome::Failed { reason, .. } => reason,
        _ => "",
    }
}
