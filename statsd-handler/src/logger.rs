//! Integration with the `log` crate.
use log::{
    kv::{self, Key, VisitSource},
    LevelFilter, Log, Metadata, Record, SetLoggerError,
};

use crate::{
    client::{MetricClient, StatsdClient},
    event::LogEvent,
    handler::StatsdHandler,
    value::Value,
};

const CRATE_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::");

/// A [`log::Log`] implementation that turns records into metrics.
///
/// Every record is converted to a [`LogEvent`] whose logger name is the record target, and whose attributes are the
/// structured key-values of the record. The formatted message is not an attribute.
pub struct StatsdLogger<C = StatsdClient> {
    handler: StatsdHandler<C>,
}

impl<C> StatsdLogger<C>
where
    C: MetricClient + 'static,
{
    /// Creates a new `StatsdLogger` around the given handler.
    pub fn new(handler: StatsdHandler<C>) -> Self {
        Self { handler }
    }

    /// Returns the handler of this logger.
    pub fn handler(&self) -> &StatsdHandler<C> {
        &self.handler
    }

    /// Installs this logger as the global logger, with the given maximum level.
    ///
    /// # Errors
    ///
    /// If a global logger has already been installed, an error is returned.
    pub fn install(self, max_level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl<C> Log for StatsdLogger<C>
where
    C: MetricClient,
{
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        !self.handler.is_disabled()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) || record.target().starts_with(CRATE_TARGET) {
            return;
        }

        let mut event = LogEvent::new(record.target());
        let _ = record.key_values().visit(&mut Collector(&mut event));
        self.handler.emit(&event);
    }

    fn flush(&self) {}
}

struct Collector<'a>(&'a mut LogEvent);

impl<'kvs> VisitSource<'kvs> for Collector<'_> {
    fn visit_pair(&mut self, key: Key<'kvs>, value: kv::Value<'kvs>) -> Result<(), kv::Error> {
        self.0.insert(key.as_str(), Some(to_value(&value)));
        Ok(())
    }
}

fn to_value(value: &kv::Value<'_>) -> Value {
    if let Some(b) = value.to_bool() {
        Value::Bool(b)
    } else if let Some(i) = value.to_i64() {
        Value::Int(i)
    } else if let Some(u) = value.to_u64() {
        Value::UInt(u)
    } else if let Some(f) = value.to_f64() {
        Value::Float(f)
    } else if let Some(s) = value.to_borrowed_str() {
        Value::from(s)
    } else {
        Value::Str(value.to_string())
    }
}
