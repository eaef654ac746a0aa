//! Tracing subscriber setup

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "STAGETREE_LOG";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Parse a `--log-format` value
    #[must_use]
    pub fn from_flag(flag: &str) -> Self {
        if flag.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Filter from `STAGETREE_LOG`, then `RUST_LOG`, else `info`
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber, logging to stderr
///
/// # Errors
/// Returns error if a global subscriber is already installed
pub fn init(format: LogFormat) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_flag() {
        assert_eq!(LogFormat::from_flag("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_flag("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_flag("text"), LogFormat::Text);
    }
}
