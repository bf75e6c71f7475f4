//! Result polling for asynchronous jobs.
//!
//! A [`Poller`] queries a provider's poll handle at a fixed interval until
//! the job succeeds, the provider declares failure, the attempt budget runs
//! out, or the caller cancels. Attempts for one job are strictly sequential.

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::FailureKind;
use crate::job::{JobOutcome, JobRequest, PollState, Provider};
use crate::providers::{ProviderAdapter, Stage, TransportErrorPolicy, interpret};
use crate::transport::Transport;

/// Snapshot reported after every attempt that left the job pending.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub provider: Provider,
    pub attempt: u32,
    pub max_attempts: u32,
    pub eta_seconds: f64,
    pub elapsed_seconds: f64,
    /// Estimated completion, capped at 99 until the job is done.
    pub percent: u8,
}

impl ProgressUpdate {
    fn estimate_percent(attempt: u32, max_attempts: u32, eta_seconds: f64, elapsed_seconds: f64) -> u8 {
        let ratio = if eta_seconds > 0.0 {
            elapsed_seconds / eta_seconds
        } else {
            f64::from(attempt) / f64::from(max_attempts.max(1))
        };
        (ratio * 100.0).clamp(0.0, 99.0) as u8
    }
}

/// Receives lifecycle notifications. All methods default to no-ops.
pub trait ProgressObserver: Send + Sync {
    fn on_submit(&self, _provider: Provider) {}

    fn on_progress(&self, _update: &ProgressUpdate) {}

    fn on_fallback(&self, _from: Provider, _to: Provider, _reason: &str) {}
}

/// Observer that ignores everything.
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

/// Terminal outcome of a poll loop and how many attempts it used.
#[derive(Debug, Clone, PartialEq)]
pub struct Polled {
    pub outcome: JobOutcome,
    pub attempts: u32,
}

pub struct Poller<'a, T: Transport> {
    transport: &'a T,
    max_attempts: u32,
    interval_ms: u64,
}

impl<'a, T: Transport> Poller<'a, T> {
    pub fn new(transport: &'a T, max_attempts: u32, interval_ms: u64) -> Self {
        Self {
            transport,
            max_attempts,
            interval_ms,
        }
    }

    /// Polls `handle` until a terminal outcome.
    ///
    /// Never returns `Pending`. Provider-declared failures end the loop at
    /// once. Transport errors follow the adapter's [`TransportErrorPolicy`].
    pub async fn poll(
        &self,
        adapter: &dyn ProviderAdapter,
        job: &JobRequest,
        handle: Url,
        eta_seconds: f64,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
    ) -> Polled {
        let operation = job.operation();
        let rules = adapter.poll_rules(operation);
        let policy = adapter.transport_error_policy(operation);
        let mut state = PollState::new(handle, self.max_attempts, self.interval_ms);
        let mut eta = eta_seconds;

        while !state.is_exhausted() {
            let call = adapter.poll_call(state.handle(), job.credentials());
            let attempt = state.record_attempt();

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(job = %job.id(), attempt, "poll cancelled");
                    return Polled { outcome: JobOutcome::cancelled(), attempts: attempt };
                }
                sent = self.transport.send(&call) => sent,
            };

            let outcome = match sent {
                Ok(response) => {
                    debug!(job = %job.id(), attempt, status = response.status, body = ?response.body, "poll response");
                    interpret(
                        adapter,
                        &response,
                        Stage::Poll {
                            handle: state.handle(),
                            rules,
                        },
                    )
                }
                Err(e) => JobOutcome::failed(FailureKind::Transport, e.to_string(), true),
            };

            match outcome {
                JobOutcome::Immediate { .. } => {
                    info!(job = %job.id(), attempt, "poll succeeded");
                    return Polled { outcome, attempts: attempt };
                }
                JobOutcome::Pending {
                    poll_handle,
                    eta_seconds,
                    ..
                } => {
                    if poll_handle != *state.handle() {
                        state.follow(poll_handle);
                    }
                    if eta_seconds > 0.0 {
                        eta = eta_seconds;
                    }
                    let elapsed = state.elapsed_seconds();
                    debug!(job = %job.id(), attempt, max = state.max_attempts(), eta, "still processing");
                    observer.on_progress(&ProgressUpdate {
                        provider: adapter.provider(),
                        attempt,
                        max_attempts: state.max_attempts(),
                        eta_seconds: eta,
                        elapsed_seconds: elapsed,
                        percent: ProgressUpdate::estimate_percent(attempt, state.max_attempts(), eta, elapsed),
                    });
                }
                JobOutcome::Failed {
                    kind: FailureKind::Transport,
                    ref reason,
                    ..
                } if policy == TransportErrorPolicy::CountAsAttempt && !state.is_exhausted() => {
                    warn!(job = %job.id(), attempt, %reason, "transient poll error, continuing");
                }
                JobOutcome::Failed { .. } => {
                    warn!(job = %job.id(), attempt, outcome = ?outcome, "poll failed");
                    return Polled { outcome, attempts: attempt };
                }
            }

            if state.is_exhausted() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Polled { outcome: JobOutcome::cancelled(), attempts: attempt };
                }
                _ = sleep(state.interval()) => {}
            }
        }

        warn!(job = %job.id(), attempts = state.attempts_made(), "poll budget exhausted");
        Polled {
            outcome: JobOutcome::timeout(),
            attempts: state.attempts_made(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::job::{Credentials, Operation};
    use crate::providers::ModelsLabAdapter;
    use crate::transport::TransportError;
    use crate::transport::mock::ScriptedTransport;
    use serde_json::json;

    fn job(operation: Operation) -> JobRequest {
        let payload = json!({"prompt": "x", "init_image": "a.png", "target_image": "b.png"});
        JobRequest::new(Provider::ModelsLab, operation, payload.as_object().cloned().unwrap())
            .with_credentials(Credentials::new("key"))
    }

    fn handle() -> Url {
        Url::parse("https://modelslab.test/fetch/7").unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        attempts: Mutex<Vec<u32>>,
    }

    impl ProgressObserver for Recorder {
        fn on_progress(&self, update: &ProgressUpdate) {
            self.attempts.lock().unwrap().push(update.attempt);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_success_after_processing() {
        let transport = ScriptedTransport::new();
        transport
            .push_repeated(200, json!({"status": "processing"}), 2)
            .push_json(200, json!({"status": "success", "output": ["https://out.png"]}));
        let recorder = Recorder::default();

        let polled = Poller::new(&transport, 30, 2000)
            .poll(
                &ModelsLabAdapter::new(None),
                &job(Operation::SingleFaceSwap),
                handle(),
                0.0,
                &CancellationToken::new(),
                &recorder,
            )
            .await;

        assert_eq!(
            polled.outcome,
            JobOutcome::Immediate {
                artifacts: vec!["https://out.png".into()],
                elapsed_seconds: 0.0,
            }
        );
        assert_eq!(polled.attempts, 3);
        assert_eq!(*recorder.attempts.lock().unwrap(), vec![1, 2]);
        assert_eq!(transport.call_count(), 3);
        assert!(transport.calls().iter().all(|c| c.url == handle()));
    }

    #[tokio::test(start_paused = true)]
    async fn never_resolving_job_times_out_within_budget() {
        let transport = ScriptedTransport::new();
        transport.push_repeated(200, json!({"status": "processing"}), 30);
        let recorder = Recorder::default();
        let started = tokio::time::Instant::now();

        let polled = Poller::new(&transport, 30, 2000)
            .poll(
                &ModelsLabAdapter::new(None),
                &job(Operation::MusicGen),
                handle(),
                0.0,
                &CancellationToken::new(),
                &recorder,
            )
            .await;

        assert_eq!(polled.outcome, JobOutcome::timeout());
        assert_eq!(polled.attempts, 30);
        assert_eq!(transport.call_count(), 30);
        assert!(started.elapsed() <= Duration::from_secs(60));
        let attempts = recorder.attempts.lock().unwrap().clone();
        assert_eq!(attempts, (1..=30).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn declared_failure_is_not_retried() {
        let transport = ScriptedTransport::new();
        transport
            .push_json(200, json!({"status": "processing"}))
            .push_json(200, json!({"status": "failed", "message": "face not detected"}))
            .push_json(200, json!({"status": "success", "output": ["never"]}));

        let polled = Poller::new(&transport, 30, 2000)
            .poll(
                &ModelsLabAdapter::new(None),
                &job(Operation::SingleFaceSwap),
                handle(),
                0.0,
                &CancellationToken::new(),
                &NoProgress,
            )
            .await;

        assert_eq!(
            polled.outcome,
            JobOutcome::failed(FailureKind::ProviderDeclared, "face not detected", false)
        );
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn future_links_end_polling() {
        let transport = ScriptedTransport::new();
        transport.push_json(
            200,
            json!({"status": "processing", "future_links": ["https://cdn/soon.mp4"]}),
        );

        let polled = Poller::new(&transport, 30, 2000)
            .poll(
                &ModelsLabAdapter::new(None),
                &job(Operation::Text2Video),
                handle(),
                0.0,
                &CancellationToken::new(),
                &NoProgress,
            )
            .await;
        assert_eq!(
            polled.outcome,
            JobOutcome::Immediate {
                artifacts: vec!["https://cdn/soon.mp4".into()],
                elapsed_seconds: 0.0,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_counts_as_attempt() {
        let transport = ScriptedTransport::new();
        transport
            .push(Err(TransportError::Timeout))
            .push_json(502, json!({}))
            .push_json(200, json!({"status": "success", "output": ["https://a.glb"]}));

        let polled = Poller::new(&transport, 5, 100)
            .poll(
                &ModelsLabAdapter::new(None),
                &job(Operation::TextTo3d),
                handle(),
                0.0,
                &CancellationToken::new(),
                &NoProgress,
            )
            .await;
        assert!(polled.outcome.is_immediate());
        assert_eq!(polled.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_on_final_attempt_is_surfaced() {
        let transport = ScriptedTransport::new();
        transport
            .push_json(200, json!({"status": "processing"}))
            .push(Err(TransportError::Network("reset".into())));

        let polled = Poller::new(&transport, 2, 100)
            .poll(
                &ModelsLabAdapter::new(None),
                &job(Operation::MusicGen),
                handle(),
                0.0,
                &CancellationToken::new(),
                &NoProgress,
            )
            .await;
        assert_eq!(polled.outcome.failure_kind(), Some(FailureKind::Transport));
        assert_eq!(polled.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn image_fetch_fails_fast_on_transport_error() {
        let transport = ScriptedTransport::new();
        transport
            .push(Err(TransportError::Network("reset".into())))
            .push_json(200, json!({"status": "success", "output": ["https://a.png"]}));

        let polled = Poller::new(&transport, 30, 2000)
            .poll(
                &ModelsLabAdapter::new(None),
                &job(Operation::Text2Img),
                handle(),
                0.0,
                &CancellationToken::new(),
                &NoProgress,
            )
            .await;
        assert_eq!(polled.outcome.failure_kind(), Some(FailureKind::Transport));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn video_fetch_fails_fast_on_transport_error() {
        let transport = ScriptedTransport::new();
        transport
            .push_json(200, json!({"status": "processing"}))
            .push(Err(TransportError::Network("reset".into())))
            .push_json(200, json!({"status": "success", "output": ["https://a.mp4"]}));

        let polled = Poller::new(&transport, 30, 2000)
            .poll(
                &ModelsLabAdapter::new(None),
                &job(Operation::Text2Video),
                handle(),
                0.0,
                &CancellationToken::new(),
                &NoProgress,
            )
            .await;
        assert_eq!(polled.outcome.failure_kind(), Some(FailureKind::Transport));
        assert_eq!(polled.attempts, 2);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling() {
        let transport = ScriptedTransport::new();
        transport.push_repeated(200, json!({"status": "processing"}), 30);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(4500)).await;
            trigger.cancel();
        });

        let polled = Poller::new(&transport, 30, 2000)
            .poll(
                &ModelsLabAdapter::new(None),
                &job(Operation::MusicGen),
                handle(),
                0.0,
                &cancel,
                &NoProgress,
            )
            .await;
        assert_eq!(polled.outcome, JobOutcome::cancelled());
        assert_eq!(transport.call_count(), 3);
    }

    #[test]
    fn percent_uses_eta_when_known() {
        assert_eq!(ProgressUpdate::estimate_percent(1, 30, 10.0, 5.0), 50);
        assert_eq!(ProgressUpdate::estimate_percent(1, 30, 10.0, 50.0), 99);
        assert_eq!(ProgressUpdate::estimate_percent(15, 30, 0.0, 0.0), 50);
    }
}
