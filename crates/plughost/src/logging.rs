use anyhow::Result;
use plughost_core::LogConfig;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber described by `config`.
///
/// `RUST_LOG` wins when it is set; otherwise the configured level is used,
/// raised to `debug` when `verbose` is on. Fails if a subscriber is already
/// installed.
pub fn init_tracing(config: &LogConfig, verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.effective_level(verbose)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_line_number(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_fails() {
        let config = LogConfig::default();
        let _ = init_tracing(&config, false);
        assert!(init_tracing(&config, true).is_err());
    }
}
