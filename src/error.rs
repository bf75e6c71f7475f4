//! Taxonomia de erros do orquestrador.
//!
//! [`GenflowError`] é o erro visto pelo chamador: uma mensagem legível e um
//! código de status de máquina ([`GenflowError::status_code`]).
//! [`FailureKind`] acompanha cada `JobOutcome::Failed` para que o
//! sequenciador de fallback saiba quais falhas permitem trocar de provedor.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::Provider;

#[derive(Debug, Error)]
pub enum GenflowError {
    /// Campo obrigatório ausente ou vazio para a operação.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuração inválida ou credencial ausente.
    #[error("config error: {0}")]
    Config(String),

    /// Falha de rede ou resposta HTTP sem corpo estruturado.
    #[error("transport error from {provider}: {message}")]
    Transport { provider: Provider, message: String },

    /// O provedor declarou explicitamente `failed`/`error`.
    #[error("{provider} reported failure: {message}")]
    ProviderDeclared { provider: Provider, message: String },

    /// Orçamento de tentativas esgotado com o job ainda em processamento.
    #[error("{provider} job timed out after {attempts} poll attempts")]
    Timeout { provider: Provider, attempts: u32 },

    /// Resposta com formato não reconhecido.
    #[error("malformed response from {provider}: {message}")]
    MalformedResponse { provider: Provider, message: String },

    #[error("job cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GenflowError {
    /// Código de status de máquina exposto ao chamador.
    pub fn status_code(&self) -> u16 {
        match self {
            GenflowError::Validation(_) => 400,
            GenflowError::ProviderDeclared { .. } => 422,
            GenflowError::Cancelled => 499,
            GenflowError::MalformedResponse { .. } => 502,
            GenflowError::Transport { .. } | GenflowError::Http(_) => 503,
            GenflowError::Timeout { .. } => 504,
            GenflowError::Config(_)
            | GenflowError::Io(_)
            | GenflowError::Json(_)
            | GenflowError::Toml(_) => 500,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenflowError::Transport { .. } | GenflowError::Http(_)
        )
    }

    /// Converts a terminal failed outcome into the caller-facing error.
    pub fn from_failure(provider: Provider, kind: FailureKind, reason: String, attempts: u32) -> Self {
        match kind {
            FailureKind::Validation => GenflowError::Validation(reason),
            FailureKind::Transport | FailureKind::ModelLoading => GenflowError::Transport {
                provider,
                message: reason,
            },
            FailureKind::ProviderDeclared => GenflowError::ProviderDeclared {
                provider,
                message: reason,
            },
            FailureKind::Timeout => GenflowError::Timeout { provider, attempts },
            FailureKind::MalformedResponse => GenflowError::MalformedResponse {
                provider,
                message: reason,
            },
            FailureKind::Cancelled => GenflowError::Cancelled,
        }
    }
}

/// Classifies a failed outcome for retry and fallback decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Required input missing; never reaches the network.
    Validation,
    /// Network failure or non-2xx without a structured body.
    Transport,
    /// Provider said "failed"/"error", or a 4xx with a structured error body.
    ProviderDeclared,
    /// Poll budget exhausted.
    Timeout,
    /// Unrecognized response shape.
    MalformedResponse,
    /// Provider is warming the model up; worth retrying with backoff.
    ModelLoading,
    Cancelled,
}

impl FailureKind {
    /// Whether the fallback chain may move on to the next provider.
    pub fn allows_fallback(self) -> bool {
        matches!(self, FailureKind::Transport | FailureKind::ModelLoading)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Validation => write!(f, "Validation"),
            FailureKind::Transport => write!(f, "Transport"),
            FailureKind::ProviderDeclared => write!(f, "ProviderDeclared"),
            FailureKind::Timeout => write!(f, "Timeout"),
            FailureKind::MalformedResponse => write!(f, "MalformedResponse"),
            FailureKind::ModelLoading => write!(f, "ModelLoading"),
            FailureKind::Cancelled => write!(f, "Cancelled"),
        }
    }
}

pub type Result<T> = std::result::Result<T, GenflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(GenflowError::Validation("x".into()).status_code(), 400);
        assert_eq!(GenflowError::Config("x".into()).status_code(), 500);
        assert_eq!(
            GenflowError::Timeout {
                provider: Provider::ModelsLab,
                attempts: 30
            }
            .status_code(),
            504
        );
        assert_eq!(GenflowError::Cancelled.status_code(), 499);
    }

    #[test]
    fn only_transport_is_retryable() {
        let transport = GenflowError::Transport {
            provider: Provider::Stability,
            message: "connection reset".into(),
        };
        assert!(transport.is_retryable());
        let declared = GenflowError::ProviderDeclared {
            provider: Provider::ModelsLab,
            message: "NSFW content".into(),
        };
        assert!(!declared.is_retryable());
    }

    #[test]
    fn timeout_display() {
        let err = GenflowError::Timeout {
            provider: Provider::ModelsLab,
            attempts: 30,
        };
        assert_eq!(err.to_string(), "modelslab job timed out after 30 poll attempts");
    }

    #[test]
    fn from_failure_maps_kinds() {
        let err = GenflowError::from_failure(
            Provider::HuggingFace,
            FailureKind::ModelLoading,
            "model is loading".into(),
            0,
        );
        assert!(matches!(err, GenflowError::Transport { .. }));

        let err = GenflowError::from_failure(
            Provider::ModelsLab,
            FailureKind::MalformedResponse,
            "invalid response format".into(),
            0,
        );
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn fallback_allowed_only_for_transport_like_kinds() {
        assert!(FailureKind::Transport.allows_fallback());
        assert!(FailureKind::ModelLoading.allows_fallback());
        assert!(!FailureKind::ProviderDeclared.allows_fallback());
        assert!(!FailureKind::Timeout.allows_fallback());
        assert!(!FailureKind::Validation.allows_fallback());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GenflowError>();
    }
}
