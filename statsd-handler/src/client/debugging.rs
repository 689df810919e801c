use std::{collections::HashSet, io, sync::Arc};

use parking_lot::Mutex;

use super::{GaugeOp, MetricClient};
use crate::{error::EmitError, value::Value};

/// A single call made to a [`DebuggingClient`].
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    /// Counter increment.
    Increment {
        /// Metric name.
        name: String,
        /// Amount.
        amount: f64,
    },

    /// Counter decrement.
    Decrement {
        /// Metric name.
        name: String,
        /// Amount.
        amount: f64,
    },

    /// Timing.
    Timing {
        /// Metric name.
        name: String,
        /// Duration, in milliseconds.
        millis: f64,
    },

    /// Gauge update.
    Gauge {
        /// Metric name.
        name: String,
        /// Value.
        value: f64,
        /// How the value is applied.
        op: GaugeOp,
    },

    /// Histogram value.
    Histogram {
        /// Metric name.
        name: String,
        /// Value.
        value: Value,
    },

    /// Set member.
    Set {
        /// Metric name.
        name: String,
        /// Value.
        value: Value,
    },
}

impl Call {
    /// Returns the metric name of this call.
    pub fn name(&self) -> &str {
        match self {
            Call::Increment { name, .. }
            | Call::Decrement { name, .. }
            | Call::Timing { name, .. }
            | Call::Gauge { name, .. }
            | Call::Histogram { name, .. }
            | Call::Set { name, .. } => name,
        }
    }
}

/// Captures point-in-time snapshots of the calls made to a [`DebuggingClient`].
#[derive(Clone)]
pub struct Snapshotter {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Snapshotter {
    /// Returns every call made so far, in order.
    pub fn snapshot(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Returns every call made so far, in order, and forgets them.
    pub fn drain(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock())
    }
}

/// A client that records every call instead of sending it anywhere.
///
/// Callers can take snapshots of the recorded calls at any time through a [`Snapshotter`]. The client can also be told
/// to fail calls for specific metric names, which are then not recorded.
#[derive(Clone, Default)]
pub struct DebuggingClient {
    calls: Arc<Mutex<Vec<Call>>>,
    failing: Arc<HashSet<String>>,
}

impl DebuggingClient {
    /// Creates a new `DebuggingClient`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call for the given metric name fail.
    #[must_use]
    pub fn failing_on<S>(mut self, name: S) -> Self
    where
        S: Into<String>,
    {
        Arc::make_mut(&mut self.failing).insert(name.into());
        self
    }

    /// Gets a `Snapshotter` attached to this client.
    pub fn snapshotter(&self) -> Snapshotter {
        Snapshotter { calls: Arc::clone(&self.calls) }
    }

    fn record(&self, call: Call) -> Result<(), EmitError> {
        if self.failing.contains(call.name()) {
            return Err(EmitError::Io(io::Error::new(io::ErrorKind::Other, "simulated send failure")));
        }

        self.calls.lock().push(call);
        Ok(())
    }
}

impl MetricClient for DebuggingClient {
    fn increment(&self, name: &str, amount: f64) -> Result<(), EmitError> {
        self.record(Call::Increment { name: name.to_string(), amount })
    }

    fn decrement(&self, name: &str, amount: f64) -> Result<(), EmitError> {
        self.record(Call::Decrement { name: name.to_string(), amount })
    }

    fn timing(&self, name: &str, millis: f64) -> Result<(), EmitError> {
        self.record(Call::Timing { name: name.to_string(), millis })
    }

    fn gauge(&self, name: &str, value: f64, op: GaugeOp) -> Result<(), EmitError> {
        self.record(Call::Gauge { name: name.to_string(), value, op })
    }

    fn histogram(&self, name: &str, value: &Value) -> Result<(), EmitError> {
        self.record(Call::Histogram { name: name.to_string(), value: value.clone() })
    }

    fn set(&self, name: &str, value: &Value) -> Result<(), EmitError> {
        self.record(Call::Set { name: name.to_string(), value: value.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::{Call, DebuggingClient};
    use crate::client::MetricClient;

    #[test]
    fn records_in_order() {
        let client = DebuggingClient::new();
        let snapshotter = client.snapshotter();

        client.increment("a", 1.0).unwrap();
        client.timing("b", 42.0).unwrap();

        assert_eq!(
            snapshotter.snapshot(),
            vec![
                Call::Increment { name: "a".to_string(), amount: 1.0 },
                Call::Timing { name: "b".to_string(), millis: 42.0 },
            ]
        );
        assert_eq!(snapshotter.drain().len(), 2);
        assert!(snapshotter.snapshot().is_empty());
    }

    #[test]
    fn failing_names_are_not_recorded() {
        let client = DebuggingClient::new().failing_on("bad");
        let snapshotter = client.snapshotter();

        assert!(client.increment("bad", 1.0).is_err());
        assert!(client.increment("good", 1.0).is_ok());
        assert_eq!(snapshotter.snapshot().len(), 1);
    }
}
