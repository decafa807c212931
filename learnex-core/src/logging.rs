//! Unified logging system
//!
//! Structured logging on top of `tracing-subscriber` with a configurable
//! output format.

use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: LogFormat,
    /// Whether to include file and line information
    pub include_location: bool,
    /// Whether to log span close events with timings
    pub log_span_timings: bool,
    /// Log file path; logs go to stdout when unset
    pub log_file_path: Option<String>,
    /// Custom filter directives
    pub filter_directives: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            include_location: false,
            log_span_timings: false,
            log_file_path: None,
            filter_directives: vec![
                "learnex_auth=debug".to_string(),
                "learnex_web=debug".to_string(),
                "tower_http=info".to_string(),
            ],
        }
    }
}

impl LoggingConfig {
    /// Build the env filter; `RUST_LOG` wins over the configured level
    pub fn env_filter(&self) -> Result<EnvFilter, Box<dyn std::error::Error + Send + Sync>> {
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        for directive in &self.filter_directives {
            filter = filter.add_directive(directive.parse()?);
        }

        Ok(filter)
    }
}

/// Initialize the logging system
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = config.env_filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    let span_events = if config.log_span_timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = fmt::layer()
        .with_span_events(span_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let file = match &config.log_file_path {
        Some(path) => Some(Arc::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?,
        )),
        None => None,
    };

    match (config.format, file) {
        (LogFormat::Json, Some(file)) => registry.with(base.json().with_writer(file)).try_init()?,
        (LogFormat::Json, None) => registry.with(base.json().with_writer(io::stdout)).try_init()?,
        (LogFormat::Pretty, Some(file)) => {
            registry.with(base.pretty().with_writer(file)).try_init()?
        }
        (LogFormat::Pretty, None) => registry
            .with(base.pretty().with_writer(io::stdout))
            .try_init()?,
        (LogFormat::Compact, Some(file)) => {
            registry.with(base.compact().with_writer(file)).try_init()?
        }
        (LogFormat::Compact, None) => registry
            .with(base.compact().with_writer(io::stdout))
            .try_init()?,
    }

    Ok(())
}
