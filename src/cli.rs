//! Interface de linha de comando do genflow baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, image, chat,
//! providers) e flags globais (--config, --max-attempts, --interval-ms,
//! --verbose, --json).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use genflow::{Operation, Provider};

/// genflow: orquestrador de jobs de geração com polling e fallback.
#[derive(Debug, Parser)]
#[command(name = "genflow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./genflow.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Máximo de consultas ao handle de polling.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Intervalo entre consultas, em milissegundos.
    #[arg(long, global = true)]
    pub interval_ms: Option<u64>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Imprime o resultado como JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa uma operação em um único provedor.
    Run {
        /// Operação (text2img, text2video, music_gen, text_to_3d,
        /// single_face_swap, multiple_face_swap, single_video_swap,
        /// specific_video_swap, chat).
        operation: Operation,

        /// Provedor que recebe o job.
        #[arg(long, default_value = "modelslab")]
        provider: Provider,

        /// Campo do payload no formato chave=valor (repetível).
        #[arg(long = "field", short = 'f', value_parser = parse_field)]
        fields: Vec<(String, String)>,

        /// Arquivo JSON com o payload; campos de --field têm precedência.
        #[arg(long)]
        payload: Option<PathBuf>,
    },

    /// Gera uma imagem percorrendo a cadeia de fallback.
    Image {
        prompt: String,

        #[arg(long)]
        negative_prompt: Option<String>,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,
    },

    /// Envia um prompt de chat.
    Chat { prompt: String },

    /// Lista os provedores e se há chave configurada.
    Providers,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
