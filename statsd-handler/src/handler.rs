use std::{borrow::Cow, path::Path};

use tracing::debug;

use crate::{
    client::{GaugeOp, MetricClient, StatsdClient},
    config::{Config, CounterRule, CounterValueType, GaugeAction, GaugeRule, ValueRule},
    error::{ConfigError, EmitError},
    event::LogEvent,
    timers::{self, TimerIndex},
    value::{non_empty, Value},
};

/// Translates log events into metric emissions.
///
/// The handler holds a [`Config`] and a [`MetricClient`]. For every attribute of an event, the rule tables are checked
/// in a fixed order (counters, gauges, timer starts, timer values, histograms, sets) and the first table with a rule
/// for the attribute decides how it is emitted. Attributes without a rule are ignored.
///
/// Emitting never fails: an attribute whose value cannot be used, or whose metric cannot be sent, is dropped without
/// affecting the other attributes of the event.
pub struct StatsdHandler<C = StatsdClient> {
    config: Config,
    timers: TimerIndex,
    client: C,
}

impl StatsdHandler<StatsdClient> {
    /// Creates a handler from a YAML configuration file, sending to the metrics daemon it names.
    ///
    /// # Errors
    ///
    /// If the file cannot be read, is not a valid configuration document, or names an unresolvable metrics daemon, an
    /// error is returned.
    pub fn from_path<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        Self::from_config(Config::from_path(path)?)
    }

    /// Creates a handler from a YAML configuration document, sending to the metrics daemon it names.
    ///
    /// # Errors
    ///
    /// If the document is not a valid configuration document, or names an unresolvable metrics daemon, an error is
    /// returned.
    pub fn from_yaml_str(document: &str) -> Result<Self, ConfigError> {
        Self::from_config(Config::from_yaml_str(document)?)
    }

    /// Creates a handler from a configuration, sending to the metrics daemon it names.
    ///
    /// # Errors
    ///
    /// If the metrics daemon address cannot be resolved, an error is returned.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let client = StatsdClient::from_options(&config.main)?;
        Ok(Self::with_client(config, client))
    }
}

impl<C> StatsdHandler<C>
where
    C: MetricClient,
{
    /// Creates a handler from a configuration, emitting through the given client.
    ///
    /// The `main` options describing the metrics daemon are not used to configure the client.
    pub fn with_client(config: Config, client: C) -> Self {
        let timers = TimerIndex::new(&config.timers);

        debug!(
            counters = config.counters.len(),
            gauges = config.gauges.len(),
            timers = config.timers.len(),
            histograms = config.histograms.len(),
            sets = config.sets.len(),
            disabled = config.main.disabled,
            "Built statsd handler."
        );

        Self { config, timers, client }
    }

    /// Returns the configuration of this handler.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the client of this handler.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns `true` if the handler is disabled and ignores every event.
    pub fn is_disabled(&self) -> bool {
        self.config.main.disabled
    }

    /// Emits the metrics for a log event.
    pub fn emit(&self, event: &LogEvent) {
        if self.is_disabled() {
            return;
        }

        for (attr, value) in event.attributes() {
            // Failures only ever affect the attribute being processed.
            let _ = if let Some(rule) = self.config.counters.get(attr) {
                self.process_counter(event, attr, value, rule)
            } else if let Some(rule) = self.config.gauges.get(attr) {
                self.process_gauge(event, attr, value, rule)
            } else if self.timers.is_start(attr) {
                self.process_timer_start(event, attr, value);
                Ok(())
            } else if self.timers.is_value(attr) {
                self.process_timer_value(event, attr, value)
            } else if let Some(rule) = self.config.histograms.get(attr) {
                self.process_value(event, attr, value, rule, |name, value| self.client.histogram(name, value));
                Ok(())
            } else if let Some(rule) = self.config.sets.get(attr) {
                self.process_value(event, attr, value, rule, |name, value| self.client.set(name, value));
                Ok(())
            } else {
                Ok(())
            };
        }
    }

    /// Sends one metric per format string of the given template.
    fn publish<F>(&self, event: &LogEvent, attr: &str, metric_name: &str, template: Option<&str>, mut send: F)
    where
        F: FnMut(&str) -> Result<(), EmitError>,
    {
        for name in self.config.templates.resolve(template).render(event.logger(), attr, metric_name) {
            let _ = send(&name);
        }
    }

    fn process_counter(
        &self,
        event: &LogEvent,
        attr: &str,
        value: Option<&Value>,
        rule: &CounterRule,
    ) -> Result<(), EmitError> {
        // An empty string counts as no value.
        let value = non_empty(value);
        let (metric_name, delta) = match rule.value_type {
            CounterValueType::Value => {
                let delta = value.map(Value::as_f64).transpose()?.unwrap_or(1.0);
                (Cow::Borrowed(attr), delta)
            }
            CounterValueType::Key => {
                let metric_name = match value {
                    Some(value) => Cow::Owned(value.to_string()),
                    None => Cow::Borrowed(rule.lookup_value.as_str()),
                };
                if !rule.value_equals.is_empty() && !rule.value_equals.iter().any(|v| *v == metric_name) {
                    return Ok(());
                }
                (metric_name, 1.0)
            }
        };

        self.publish(event, attr, &metric_name, rule.publish_template.as_deref(), |name| {
            if delta > 0.0 {
                self.client.increment(name, delta)
            } else {
                self.client.decrement(name, delta.abs())
            }
        });
        Ok(())
    }

    fn process_gauge(
        &self,
        event: &LogEvent,
        attr: &str,
        value: Option<&Value>,
        rule: &GaugeRule,
    ) -> Result<(), EmitError> {
        let Some(value) = value else {
            return Ok(());
        };
        let value = value.as_f64()?;
        let op = match rule.action {
            GaugeAction::Send => GaugeOp::Set,
            GaugeAction::Increment => GaugeOp::Increment,
            GaugeAction::Decrement => GaugeOp::Decrement,
        };
        let metric_name = rule.name.as_deref().unwrap_or(attr);

        self.publish(event, attr, metric_name, rule.publish_template.as_deref(), |name| {
            self.client.gauge(name, value, op)
        });
        Ok(())
    }

    fn process_timer_start(&self, event: &LogEvent, start_attr: &str, start: Option<&Value>) {
        let Some(start) = non_empty(start) else {
            return;
        };

        // Every end attribute present on the event yields its own timing.
        for end_attr in self.timers.end_attributes() {
            if let Some(end) = non_empty(event.get(end_attr)) {
                let _ = self.process_timer_pair(event, start_attr, start, end_attr, end);
            }
        }
    }

    fn process_timer_pair(
        &self,
        event: &LogEvent,
        start_attr: &str,
        start: &Value,
        end_attr: &str,
        end: &Value,
    ) -> Result<(), EmitError> {
        let Some(rule) = timers::find_pair(&self.config.timers, start_attr, end_attr) else {
            return Ok(());
        };
        let elapsed = end.as_f64()? - start.as_f64()?;
        let metric_name = rule.name.as_deref().unwrap_or(start_attr);

        self.publish(event, "", metric_name, rule.publish_template.as_deref(), |name| {
            self.client.timing(name, elapsed)
        });
        Ok(())
    }

    fn process_timer_value(&self, event: &LogEvent, attr: &str, value: Option<&Value>) -> Result<(), EmitError> {
        let Some(value) = non_empty(value) else {
            return Ok(());
        };
        let Some(rule) = timers::find_value(&self.config.timers, attr) else {
            return Ok(());
        };
        let elapsed = value.as_f64()?;
        let metric_name = rule.name.as_deref().unwrap_or(attr);

        self.publish(event, "", metric_name, rule.publish_template.as_deref(), |name| {
            self.client.timing(name, elapsed)
        });
        Ok(())
    }

    fn process_value<F>(&self, event: &LogEvent, attr: &str, value: Option<&Value>, rule: &ValueRule, send: F)
    where
        F: Fn(&str, &Value) -> Result<(), EmitError>,
    {
        let Some(value) = value else {
            return;
        };
        let metric_name = rule.name.as_deref().unwrap_or(attr);

        self.publish(event, attr, metric_name, rule.publish_template.as_deref(), |name| send(name, value));
    }
}
