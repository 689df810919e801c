use metrics::{Key, Level, Metadata, Recorder};
use metrics_exporter_dogstatsd::{DogStatsDBuilder, DogStatsDRecorder};

use super::{GaugeOp, MetricClient};
use crate::{
    config::MainOptions,
    error::{ConfigError, EmitError},
    value::Value,
};

static METADATA: Metadata<'static> = Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// A client that routes emissions through a [`metrics`] recorder.
///
/// This lets the handler feed any `metrics` exporter, with the exporter's own aggregation and flushing behavior.
/// The `metrics` data model has no decrementing counters and no sets, so those operations fail with
/// [`EmitError::Unsupported`]. Timings are recorded as histograms, and counter increments are rounded to the nearest
/// whole number.
pub struct RecorderClient<R> {
    recorder: R,
    prefix: Option<String>,
}

impl<R> RecorderClient<R>
where
    R: Recorder,
{
    /// Creates a new `RecorderClient` over the given recorder.
    pub fn new(recorder: R) -> Self {
        Self { recorder, prefix: None }
    }

    /// Set the namespace prepended to every metric name, separated by a dot.
    #[must_use]
    pub fn with_prefix<S>(mut self, prefix: S) -> Self
    where
        S: Into<String>,
    {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    /// Returns a reference to the underlying recorder.
    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    fn key(&self, name: &str) -> Key {
        match &self.prefix {
            Some(prefix) => {
                let mut new_name = String::with_capacity(prefix.len() + 1 + name.len());
                new_name.push_str(prefix);
                new_name.push('.');
                new_name.push_str(name);
                Key::from_name(new_name)
            }
            None => Key::from_name(name.to_string()),
        }
    }
}

impl RecorderClient<DogStatsDRecorder> {
    /// Creates a client backed by a DogStatsD exporter, sending to the host and port of the handler options and using
    /// the application key as namespace.
    ///
    /// The exporter spawns its own background thread to flush metrics.
    ///
    /// # Errors
    ///
    /// If the exporter cannot be built, an error is returned.
    pub fn dogstatsd(options: &MainOptions) -> Result<Self, ConfigError> {
        let recorder = DogStatsDBuilder::default().with_remote_address(options.remote_address())?.build()?;
        Ok(Self::new(recorder).with_prefix(options.app_key.clone()))
    }
}

impl<R> MetricClient for RecorderClient<R>
where
    R: Recorder + Send + Sync,
{
    fn increment(&self, name: &str, amount: f64) -> Result<(), EmitError> {
        let counter = self.recorder.register_counter(&self.key(name), &METADATA);
        counter.increment(amount.round() as u64);
        Ok(())
    }

    fn decrement(&self, _name: &str, _amount: f64) -> Result<(), EmitError> {
        Err(EmitError::Unsupported("decrement"))
    }

    fn timing(&self, name: &str, millis: f64) -> Result<(), EmitError> {
        self.recorder.register_histogram(&self.key(name), &METADATA).record(millis);
        Ok(())
    }

    fn gauge(&self, name: &str, value: f64, op: GaugeOp) -> Result<(), EmitError> {
        let gauge = self.recorder.register_gauge(&self.key(name), &METADATA);
        match op {
            GaugeOp::Set => gauge.set(value),
            GaugeOp::Increment => gauge.increment(value),
            GaugeOp::Decrement => gauge.decrement(value),
        }
        Ok(())
    }

    fn histogram(&self, name: &str, value: &Value) -> Result<(), EmitError> {
        let value = value.as_f64()?;
        self.recorder.register_histogram(&self.key(name), &METADATA).record(value);
        Ok(())
    }

    fn set(&self, _name: &str, _value: &Value) -> Result<(), EmitError> {
        Err(EmitError::Unsupported("set"))
    }
}
