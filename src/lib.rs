//! genflow: submissão, polling e fallback de jobs de geração em provedores
//! de IA (ModelsLab, Stability, Hugging Face, OpenAI).

pub mod classify;
pub mod config;
pub mod error;
pub mod fallback;
pub mod job;
pub mod logging;
pub mod orchestrator;
pub mod poll;
pub mod providers;
pub mod submit;
pub mod transport;

pub use config::GenflowConfig;
pub use error::{FailureKind, GenflowError, Result};
pub use job::{Credentials, Generation, JobOutcome, JobRequest, Operation, PollState, Provider};
pub use orchestrator::JobOrchestrator;
pub use poll::{NoProgress, ProgressObserver, ProgressUpdate};
pub use tokio_util::sync::CancellationToken;
