//! Metric clients.
//!
//! The dispatcher never talks to a metrics daemon directly: every emission goes through a [`MetricClient`]. Three
//! implementations are provided:
//!
//! - [`StatsdClient`] sends plain statsd metrics over UDP (or a Unix datagram socket) through [`cadence`]
//! - [`RecorderClient`] routes emissions through a [`metrics`] recorder, such as the DogStatsD exporter
//! - [`DebuggingClient`] records every call, for tests and troubleshooting
use crate::{error::EmitError, value::Value};

mod debugging;
pub use self::debugging::{Call, DebuggingClient, Snapshotter};

mod recorder;
pub use self::recorder::RecorderClient;

mod statsd;
pub use self::statsd::{StatsdClient, StatsdClientBuilder};

/// How a gauge value is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GaugeOp {
    /// Sets the gauge to the value.
    Set,

    /// Increments the gauge by the value.
    Increment,

    /// Decrements the gauge by the value.
    Decrement,
}

/// A client able to emit metrics to a metrics daemon.
///
/// Every operation is best effort: an error means the metric was dropped, and the caller is free to ignore it.
/// Metric names are passed without the namespace prefix, which is the client's concern.
pub trait MetricClient: Send + Sync {
    /// Increments a counter by `amount`.
    fn increment(&self, name: &str, amount: f64) -> Result<(), EmitError>;

    /// Decrements a counter by `amount`.
    fn decrement(&self, name: &str, amount: f64) -> Result<(), EmitError>;

    /// Records a duration, in milliseconds.
    fn timing(&self, name: &str, millis: f64) -> Result<(), EmitError>;

    /// Updates a gauge.
    fn gauge(&self, name: &str, value: f64, op: GaugeOp) -> Result<(), EmitError>;

    /// Records a value in a histogram.
    fn histogram(&self, name: &str, value: &Value) -> Result<(), EmitError>;

    /// Adds a value to a set.
    fn set(&self, name: &str, value: &Value) -> Result<(), EmitError>;
}

impl<C> MetricClient for std::sync::Arc<C>
where
    C: MetricClient + ?Sized,
{
    fn increment(&self, name: &str, amount: f64) -> Result<(), EmitError> {
        (**self).increment(name, amount)
    }

    fn decrement(&self, name: &str, amount: f64) -> Result<(), EmitError> {
        (**self).decrement(name, amount)
    }

    fn timing(&self, name: &str, millis: f64) -> Result<(), EmitError> {
        (**self).timing(name, millis)
    }

    fn gauge(&self, name: &str, value: f64, op: GaugeOp) -> Result<(), EmitError> {
        (**self).gauge(name, value, op)
    }

    fn histogram(&self, name: &str, value: &Value) -> Result<(), EmitError> {
        (**self).histogram(name, value)
    }

    fn set(&self, name: &str, value: &Value) -> Result<(), EmitError> {
        (**self).set(name, value)
    }
}
