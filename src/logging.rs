//! Structured logging setup
//!
//! Logs go to stderr so that stdout stays free for the outputs map. `RUST_LOG`
//! directives take precedence over the configured default level.

use crate::config::LoggingConfig;
use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Supported log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                raw
            ),
        }
    }
}

/// Default level for this run: DEBUG when verbose, otherwise the configured level
pub fn default_level(config: &LoggingConfig, verbose: bool) -> Result<Level> {
    if verbose {
        return Ok(Level::DEBUG);
    }
    config
        .level
        .to_lowercase()
        .parse()
        .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
}

/// Build the env filter with `level` as the default directive
pub fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global subscriber
///
/// Returns an error if the configuration is invalid or a subscriber is already set.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = default_level(config, verbose)?;
    let format = LogFormat::parse(&config.format)?;
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter(level));

    let result = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
