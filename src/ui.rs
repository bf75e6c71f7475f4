//! Interface de terminal do genflow: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. O [`JobProgress`] implementa
//! [`ProgressObserver`] e acompanha visualmente o polling e o fallback.

use console::Style;
use genflow::{GenflowError, Generation, ProgressObserver, ProgressUpdate, Provider};
use indicatif::{ProgressBar, ProgressStyle};

/// Indicador visual de progresso para a execução de um job no terminal.
///
/// Exibe um spinner animado durante o processamento e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e fallback (amarelo).
pub struct JobProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para mensagens de fallback.
    yellow: Style,
}

impl JobProgress {
    /// Inicia o spinner com a descrição do job e retorna a instância de progresso.
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(description.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e exibe o resultado final do job.
    ///
    /// Sucesso é mostrado em verde com checkmark; falha em vermelho com X,
    /// junto com o código de status.
    pub fn complete(&self, result: &Result<Generation, GenflowError>) {
        self.pb.finish_and_clear();
        match result {
            Ok(generation) => {
                eprintln!(
                    "  {} {} produced {} artifact(s) in {:.1}s",
                    self.green.apply_to("✓"),
                    generation.provider,
                    generation.artifacts.len(),
                    generation.elapsed_seconds
                );
            }
            Err(err) => {
                eprintln!(
                    "  {} [{}] {err}",
                    self.red.apply_to("✗"),
                    err.status_code()
                );
            }
        }
    }
}

impl ProgressObserver for JobProgress {
    fn on_submit(&self, provider: Provider) {
        self.pb.set_message(format!("{provider}: submitting"));
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        let eta = if update.eta_seconds > 0.0 {
            format!(", eta {:.0}s", update.eta_seconds)
        } else {
            String::new()
        };
        self.pb.set_message(format!(
            "{}: processing {}% (attempt {}/{}{eta})",
            update.provider, update.percent, update.attempt, update.max_attempts
        ));
    }

    fn on_fallback(&self, from: Provider, to: Provider, reason: &str) {
        self.pb.println(format!(
            "  {} {from} failed ({reason}), trying {to}",
            self.yellow.apply_to("↻")
        ));
    }
}

/// Formats an artifact for the terminal. Inline data URLs are summarized.
pub fn display_artifact(artifact: &str) -> String {
    match artifact.split_once(";base64,") {
        Some((mime, data)) if artifact.starts_with("data:") => {
            format!("{mime};base64,<{} bytes encoded>", data.len())
        }
        _ => artifact.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_printed_verbatim() {
        assert_eq!(display_artifact("https://cdn/out.png"), "https://cdn/out.png");
    }

    #[test]
    fn data_urls_are_summarized() {
        assert_eq!(
            display_artifact("data:image/png;base64,AAAABBBB"),
            "data:image/png;base64,<8 bytes encoded>"
        );
    }
}
