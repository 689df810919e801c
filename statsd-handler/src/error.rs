use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that could occur while loading a configuration or building a handler.
///
/// These are only ever returned at construction time: once a handler exists, it never fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read configuration file '{}': {source}", path.display())]
    Io {
        /// Path that was being read.
        path: PathBuf,

        /// Underlying I/O error.
        source: io::Error,
    },

    /// The configuration document is not valid YAML, or does not have the expected structure.
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A publish template contains a malformed format string.
    #[error("invalid publish template '{name}': {reason}")]
    Template {
        /// Name of the offending template.
        name: String,

        /// Details about the parsing failure.
        reason: String,
    },

    /// The sample rate is outside of `(0, 1]`.
    #[error("invalid sample rate {0} (expected a value greater than 0 and at most 1)")]
    InvalidSampleRate(f64),

    /// Failed to resolve the remote address of the metrics daemon.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the resolution failure.
        reason: String,
    },

    /// Failed to open the socket used to send metrics.
    #[error("failed to open metrics socket: {0}")]
    Socket(#[source] io::Error),

    /// Failed to set up the statsd client.
    #[error("failed to set up statsd client: {0}")]
    Client(#[from] cadence::MetricError),

    /// Failed to build the DogStatsD exporter backing a recorder client.
    #[error("failed to build DogStatsD exporter: {0}")]
    Exporter(#[from] metrics_exporter_dogstatsd::BuildError),
}

/// Errors that could occur while emitting a single metric.
///
/// The dispatcher discards these: a failed emission is dropped without affecting any other emission.
#[derive(Debug, Error)]
pub enum EmitError {
    /// The value could not be interpreted as a number.
    #[error("value is not numeric")]
    NotNumeric,

    /// The metric could not be sent to the metrics daemon.
    #[error("failed to send metric: {0}")]
    Io(#[from] io::Error),

    /// The statsd client rejected or failed to send the metric.
    #[error("failed to emit metric: {0}")]
    Client(#[from] cadence::MetricError),

    /// The client has no way to represent the requested operation.
    #[error("operation '{0}' is not supported by this client")]
    Unsupported(&'static str),
}
