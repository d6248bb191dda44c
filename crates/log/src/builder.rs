//! Logger builder

use std::io;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Format, WriterConfig};
use crate::error::{LogError, LogResult};

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Guard that keeps the logger's root span entered
///
/// Hold it for the lifetime of the process; dropping it exits the root span.
#[derive(Debug)]
pub struct LoggerGuard {
    _root_span_guard: Option<tracing::span::EnteredSpan>,
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Install the global subscriber.
    ///
    /// Fails with [`LogError::Filter`] if the level directive does not parse
    /// and with [`LogError::AlreadyInitialized`] if a subscriber is already set.
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = EnvFilter::try_new(&self.config.level).map_err(|e| LogError::Filter {
            filter: self.config.level.clone(),
            reason: e.to_string(),
        })?;

        let writer = make_writer(self.config.writer);
        let display = &self.config.display;
        let registry = Registry::default().with(filter);

        match self.config.format {
            Format::Pretty => registry
                .with(create_fmt_layer!(pretty, display, writer))
                .try_init(),
            Format::Compact => registry
                .with(create_fmt_layer!(compact, display, writer))
                .try_init(),
            Format::Json => registry
                .with(create_json_layer!(display, writer))
                .try_init(),
        }
        .map_err(|_| LogError::AlreadyInitialized)?;

        let root = self
            .config
            .service
            .as_deref()
            .map(|service| tracing::info_span!("service", name = %service).entered());

        Ok(LoggerGuard {
            _root_span_guard: root,
        })
    }
}

fn make_writer(config: WriterConfig) -> BoxMakeWriter {
    match config {
        WriterConfig::Stderr => BoxMakeWriter::new(io::stderr),
        WriterConfig::Stdout => BoxMakeWriter::new(io::stdout),
    }
}
