//! Structured logging setup.
//!
//! Logs go to stderr so stdout only carries results. `RUST_LOG` takes
//! precedence over the verbosity flag.

use tracing_subscriber::EnvFilter;

pub fn default_filter(verbose: bool) -> &'static str {
    if verbose { "genflow=debug" } else { "genflow=warn" }
}

/// Installs the global subscriber. Calling it twice is harmless.
pub fn init_logging(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let _ = tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_selects_filter() {
        assert_eq!(default_filter(true), "genflow=debug");
        assert_eq!(default_filter(false), "genflow=warn");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_logging(false);
        init_logging(true);
    }
}
