//! Log output of the command line tool.
//!
//! Logs are always written to stderr so that stdout only carries the report.

use snafu::{ResultExt, Snafu};
use tracing::{level_filters::LevelFilter, subscriber::SetGlobalDefaultError};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt};

/// The environment variable holding the log filter directives.
pub const LOG_ENV_VAR: &str = "CRD_SCHEMA_CHECKER_LOG";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("unable to set the global default subscriber"))]
    SetGlobalDefaultSubscriber { source: SetGlobalDefaultError },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Plain,

    /// One JSON object per event.
    Json,
}

/// Settings of the log subscriber.
#[derive(Debug, PartialEq, Eq)]
pub struct LogSettings {
    /// The environment variable used to set the filter. When it is set, it
    /// overrides [`Self::default_level`].
    pub environment_variable: &'static str,

    pub default_level: LevelFilter,

    pub format: LogFormat,
}

impl LogSettings {
    pub fn builder() -> LogSettingsBuilder {
        LogSettingsBuilder::default()
    }
}

/// For building [`LogSettings`].
pub struct LogSettingsBuilder {
    environment_variable: &'static str,
    default_level: LevelFilter,
    format: LogFormat,
}

impl Default for LogSettingsBuilder {
    fn default() -> Self {
        Self {
            environment_variable: LOG_ENV_VAR,
            default_level: LevelFilter::WARN,
            format: LogFormat::default(),
        }
    }
}

impl LogSettingsBuilder {
    /// Defaults to [`LOG_ENV_VAR`].
    pub fn with_environment_variable(mut self, name: &'static str) -> Self {
        self.environment_variable = name;
        self
    }

    /// Defaults to [`LevelFilter::WARN`].
    pub fn with_default_level(mut self, level: impl Into<LevelFilter>) -> Self {
        self.default_level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn build(self) -> LogSettings {
        LogSettings {
            environment_variable: self.environment_variable,
            default_level: self.default_level,
            format: self.format,
        }
    }
}

/// Installs the global subscriber described by `settings`.
pub fn init(settings: &LogSettings) -> Result<(), Error> {
    let env_filter = EnvFilter::builder()
        .with_env_var(settings.environment_variable)
        .with_default_directive(settings.default_level.into())
        .from_env_lossy();

    let layer = match settings.format {
        LogFormat::Plain => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
    };

    let subscriber = Registry::default().with(layer);
    tracing::subscriber::set_global_default(subscriber).context(SetGlobalDefaultSubscriberSnafu)
}
