use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::FailureKind;
use crate::job::{JobOutcome, JobRequest};
use crate::providers::{ProviderAdapter, Stage, interpret};
use crate::transport::Transport;

/// Issues the initial request of a job.
pub struct Submitter<'a, T: Transport> {
    transport: &'a T,
}

impl<'a, T: Transport> Submitter<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Validates `job` and sends exactly one request for it.
    ///
    /// Validation failures return before touching the network. Network
    /// errors and 5xx responses are retryable; 4xx responses are not.
    pub async fn submit(
        &self,
        adapter: &dyn ProviderAdapter,
        job: &JobRequest,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        if let Err(reason) = job.validate() {
            debug!(job = %job.id(), %reason, "rejected before submit");
            return JobOutcome::failed(FailureKind::Validation, reason, false);
        }
        if !adapter.supports(job.operation()) {
            return JobOutcome::failed(
                FailureKind::Validation,
                format!("{} does not support {}", adapter.provider(), job.operation()),
                false,
            );
        }
        let call = match adapter.submit_call(job) {
            Ok(call) => call,
            Err(e) => return JobOutcome::failed(FailureKind::Validation, e.to_string(), false),
        };

        info!(
            job = %job.id(),
            provider = %adapter.provider(),
            operation = %job.operation(),
            "submitting job"
        );

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return JobOutcome::cancelled(),
            sent = self.transport.send(&call) => sent,
        };

        let outcome = match sent {
            Ok(response) => {
                debug!(job = %job.id(), status = response.status, body = ?response.body, "submit response");
                interpret(adapter, &response, Stage::Submit)
            }
            Err(e) => JobOutcome::failed(FailureKind::Transport, e.to_string(), true),
        };

        if let JobOutcome::Failed { reason, kind, .. } = &outcome {
            warn!(job = %job.id(), provider = %adapter.provider(), %kind, %reason, "submit failed");
        }
        outcome
    }
}
