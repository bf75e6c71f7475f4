use serde_json::{Map, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::GenflowConfig;
use crate::error::{GenflowError, Result};
use crate::fallback::{BackoffConfig, FallbackSequencer, ProviderRun};
use crate::job::{Generation, JobOutcome, JobRequest, Operation, Provider};
use crate::poll::ProgressObserver;
use crate::providers::ProviderRegistry;
use crate::transport::{HttpTransport, Transport};

/// Drives generation jobs from request to terminal result.
///
/// Built once at startup from an explicit configuration and shared by
/// reference; independent jobs may run concurrently on the same instance.
pub struct JobOrchestrator<T: Transport = HttpTransport> {
    config: GenflowConfig,
    registry: ProviderRegistry,
    transport: T,
}

impl JobOrchestrator<HttpTransport> {
    /// Create an orchestrator with the default adapters and an HTTP transport.
    pub fn from_config(config: GenflowConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.http)?;
        let registry = ProviderRegistry::from_config(&config);
        Ok(Self::new(config, registry, transport))
    }
}

impl<T: Transport> JobOrchestrator<T> {
    pub fn new(config: GenflowConfig, registry: ProviderRegistry, transport: T) -> Self {
        Self {
            config,
            registry,
            transport,
        }
    }

    pub fn config(&self) -> &GenflowConfig {
        &self.config
    }

    /// Run a job against a single provider: submit, then poll if needed.
    pub async fn run(
        &self,
        provider: Provider,
        operation: Operation,
        payload: Map<String, Value>,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
    ) -> Result<Generation> {
        let job = JobRequest::new(provider, operation, payload);
        job.validate().map_err(GenflowError::Validation)?;
        let adapter = self.registry.for_operation(provider, operation)?;
        let job = job.with_credentials(self.config.credentials(provider)?);

        let started = Instant::now();
        let run = FallbackSequencer::new(
            &self.transport,
            &self.registry,
            self.config.poll,
            BackoffConfig::none(),
        )
        .attempt_provider(adapter, &job, 0, cancel, observer)
        .await;
        finish(run, started)
    }

    /// Generate an image, walking the configured provider order until one
    /// succeeds.
    pub async fn generate_image(
        &self,
        payload: Map<String, Value>,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
    ) -> Result<Generation> {
        let order = &self.config.fallback.image_order;
        let primary = *order
            .first()
            .ok_or_else(|| GenflowError::Config("fallback.image_order must not be empty".into()))?;
        let job = JobRequest::new(primary, Operation::Text2Img, payload);
        job.validate().map_err(GenflowError::Validation)?;

        // Every key in the chain must exist before anything is sent.
        let chain = order
            .iter()
            .map(|p| Ok((*p, self.config.credentials(*p)?)))
            .collect::<Result<Vec<_>>>()?;

        let started = Instant::now();
        let run = FallbackSequencer::new(
            &self.transport,
            &self.registry,
            self.config.poll,
            BackoffConfig::from(&self.config.fallback),
        )
        .generate_with_fallback(&job, &chain, cancel, observer)
        .await;
        finish(run, started)
    }

    /// Single chat completion.
    pub async fn chat(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
        observer: &dyn ProgressObserver,
    ) -> Result<Generation> {
        let mut payload = Map::new();
        payload.insert("prompt".into(), Value::String(prompt.to_string()));
        self.run(Provider::OpenAi, Operation::Chat, payload, cancel, observer)
            .await
    }
}

fn finish(run: ProviderRun, started: Instant) -> Result<Generation> {
    match run.outcome {
        JobOutcome::Immediate {
            artifacts,
            elapsed_seconds: provider_seconds,
        } => {
            let generation = Generation {
                provider: run.provider,
                fallback_position: run.position,
                job_id: run.job_id,
                artifacts,
                elapsed_seconds: started.elapsed().as_secs_f64(),
                provider_seconds,
                poll_attempts: run.poll_attempts,
            };
            info!(
                provider = %generation.provider,
                artifacts = generation.artifacts.len(),
                elapsed = generation.elapsed_seconds,
                "job completed"
            );
            Ok(generation)
        }
        JobOutcome::Failed { reason, kind, .. } => Err(GenflowError::from_failure(
            run.provider,
            kind,
            reason,
            run.poll_attempts,
        )),
        JobOutcome::Pending { .. } => Err(GenflowError::MalformedResponse {
            provider: run.provider,
            message: "job still pending after polling".into(),
        }),
    }
}
