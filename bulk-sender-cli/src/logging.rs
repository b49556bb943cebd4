use anyhow::Result;
use std::env;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Diagnostics go to stderr; `LOG_LEVEL` (error, warn, info, debug) sets the
/// baseline and `RUST_LOG` directives refine it.
pub fn init_logging() -> Result<()> {
    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            _ => Level::WARN,
        })
        .unwrap_or(Level::WARN);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    Ok(())
}
