//! Configuração do genflow carregada a partir de `genflow.toml`.
//!
//! A struct [`GenflowConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `*_API_KEY` têm precedência sobre o arquivo.
//! A configuração é lida uma vez no início do processo e passada
//! explicitamente para quem precisa dela.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::{GenflowError, Result};
use crate::job::{Credentials, Provider};

pub const DEFAULT_CONFIG_FILE: &str = "genflow.toml";

/// Configuração de nível superior carregada de `genflow.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenflowConfig {
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub fallback: FallbackSettings,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Orçamento do laço de polling.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PollSettings {
    /// Máximo de consultas ao handle antes de desistir com timeout.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Intervalo fixo entre consultas, em milissegundos.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

/// Timeouts do cliente HTTP.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Cadeia de fallback para geração de imagens.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackSettings {
    /// Ordem de prioridade dos provedores.
    #[serde(default = "default_image_order")]
    pub image_order: Vec<Provider>,
    /// Tentativas enquanto o provedor reporta "modelo carregando".
    #[serde(default = "default_model_loading_attempts")]
    pub model_loading_attempts: u32,
    /// Atraso base em milissegundos; dobra a cada tentativa.
    #[serde(default = "default_model_loading_base_delay_ms")]
    pub model_loading_base_delay_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub modelslab: ProviderSettings,
    #[serde(default)]
    pub stability: ProviderSettings,
    #[serde(default)]
    pub huggingface: ProviderSettings,
    #[serde(default)]
    pub openai: ProviderSettings,
}

/// Chave e URL base de um provedor.
#[derive(Clone, Default, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub api_key: String,
    /// Substitui a URL base padrão do provedor (útil para testes).
    #[serde(default)]
    pub base_url: Option<String>,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("base_url", &self.base_url)
            .finish()
    }
}

// Valor padrão para tentativas de polling: 30.
fn default_max_attempts() -> u32 {
    30
}

// Valor padrão para o intervalo de polling: 2000ms.
fn default_interval_ms() -> u64 {
    2000
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_image_order() -> Vec<Provider> {
    vec![Provider::ModelsLab, Provider::Stability, Provider::HuggingFace]
}

fn default_model_loading_attempts() -> u32 {
    5
}

fn default_model_loading_base_delay_ms() -> u64 {
    2000
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            image_order: default_image_order(),
            model_loading_attempts: default_model_loading_attempts(),
            model_loading_base_delay_ms: default_model_loading_base_delay_ms(),
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::ModelsLab => &self.modelslab,
            Provider::Stability => &self.stability,
            Provider::HuggingFace => &self.huggingface,
            Provider::OpenAi => &self.openai,
        }
    }

    fn get_mut(&mut self, provider: Provider) -> &mut ProviderSettings {
        match provider {
            Provider::ModelsLab => &mut self.modelslab,
            Provider::Stability => &mut self.stability,
            Provider::HuggingFace => &mut self.huggingface,
            Provider::OpenAi => &mut self.openai,
        }
    }
}

impl GenflowConfig {
    /// Carrega `genflow.toml` do diretório atual e aplica o ambiente.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Carrega a configuração do caminho dado.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<GenflowConfig>(&contents)?
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Variável de ambiente tem precedência sobre o arquivo para as chaves.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for provider in Provider::ALL {
            if let Some(key) = lookup(provider.env_key())
                && !key.is_empty()
            {
                self.providers.get_mut(provider).api_key = key;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll.max_attempts == 0 {
            return Err(GenflowError::Config("poll.max_attempts must be at least 1".into()));
        }
        if self.fallback.image_order.is_empty() {
            return Err(GenflowError::Config("fallback.image_order must not be empty".into()));
        }
        if self.fallback.model_loading_attempts == 0 {
            return Err(GenflowError::Config(
                "fallback.model_loading_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Credencial do provedor; ausência é erro fatal de configuração.
    pub fn credentials(&self, provider: Provider) -> Result<Credentials> {
        let key = &self.providers.get(provider).api_key;
        if key.is_empty() {
            return Err(GenflowError::Config(format!(
                "missing API key for {provider}: set {} or providers.{provider}.api_key",
                provider.env_key()
            )));
        }
        Ok(Credentials::new(key.clone()))
    }

    pub fn has_key(&self, provider: Provider) -> bool {
        !self.providers.get(provider).api_key.is_empty()
    }
}
