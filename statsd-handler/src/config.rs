//! Handler configuration.
//!
//! The configuration is a YAML document with the following top-level sections, all optional:
//!
//! ```yaml
//! main:
//!   app_key: my_app        # metric namespace, defaults to `default_app_key`
//!   host: localhost        # metrics daemon host, defaults to `localhost`
//!   port: 8125             # metrics daemon port, defaults to 8125
//!   sample_rate: 1         # validated, but not applied by the statsd client
//!   disabled: false        # turns the handler into a no-op, defaults to false
//!
//! publish_templates:
//!   short:
//!     - "%(logger)s.%(metric_name)s"
//!
//! counters:
//!   REQUEST_METHOD:
//!     value_type: key      # `key` (default) or `value`
//!     value_equals: [GET, PUT]
//!     lookup_value: UNKNOWN
//!     publish_template: short
//!
//! gauges:
//!   QUEUE_DEPTH:
//!     action: send         # `send` (default), `increment` or `decrement`
//!     name: queue_depth
//!
//! timers:
//!   - start_attr_name: REQUEST_START
//!     end_attr_name: REQUEST_END
//!     name: request_time
//!   - value_attr_name: REQUEST_DURATION
//!
//! histograms:
//!   RESPONSE_SIZE: {}
//!
//! sets:
//!   USER_ID:
//!     name: unique_users
//! ```
//!
//! Any option missing from `main`, or set to an empty value, falls back to its default.
use std::{fs, io::Read, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::{error::ConfigError, template::Templates, value::Value};

const DEFAULT_APP_KEY: &str = "default_app_key";
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 8125;
const DEFAULT_SAMPLE_RATE: f64 = 1.0;

/// Handler options from the `main` section.
#[derive(Clone, Debug, PartialEq)]
pub struct MainOptions {
    /// Namespace prepended to every metric name.
    pub app_key: String,

    /// Host of the metrics daemon.
    pub host: String,

    /// Port of the metrics daemon.
    pub port: u16,

    /// Client-side sample rate, in `(0, 1]`.
    pub sample_rate: f64,

    /// Whether or not the handler is disabled.
    pub disabled: bool,
}

impl MainOptions {
    /// Returns the remote address of the metrics daemon, in `<host>:<port>` form.
    pub fn remote_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for MainOptions {
    fn default() -> Self {
        Self {
            app_key: DEFAULT_APP_KEY.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            sample_rate: DEFAULT_SAMPLE_RATE,
            disabled: false,
        }
    }
}

/// How a counter derives its metric name and delta from the attribute value.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CounterValueType {
    /// The attribute value is the metric name, and the delta is always 1.
    #[default]
    Key,

    /// The attribute name is the metric name, and the attribute value is the delta.
    Value,
}

const DEFAULT_LOOKUP_VALUE: &str = "None";

/// A counter rule.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CounterRule {
    /// Metric name to use in `key` mode when the attribute has no value. Defaults to `None`.
    #[serde(deserialize_with = "lookup_value")]
    pub lookup_value: String,

    /// How the metric name and delta are derived.
    #[serde(deserialize_with = "nullable")]
    pub value_type: CounterValueType,

    /// In `key` mode, the metric names that are allowed to be emitted. Empty allows everything.
    #[serde(deserialize_with = "scalar_list")]
    pub value_equals: Vec<String>,

    /// Publish template to use.
    pub publish_template: Option<String>,
}

impl Default for CounterRule {
    fn default() -> Self {
        Self {
            lookup_value: DEFAULT_LOOKUP_VALUE.to_string(),
            value_type: CounterValueType::default(),
            value_equals: Vec::new(),
            publish_template: None,
        }
    }
}

/// What a gauge does with the attribute value.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GaugeAction {
    /// Sets the gauge to the value.
    #[default]
    Send,

    /// Increments the gauge by the value.
    Increment,

    /// Decrements the gauge by the value.
    Decrement,
}

/// A gauge rule.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct GaugeRule {
    /// What to do with the attribute value.
    #[serde(deserialize_with = "nullable")]
    pub action: GaugeAction,

    /// Metric name to use instead of the attribute name.
    pub name: Option<String>,

    /// Publish template to use.
    pub publish_template: Option<String>,
}

/// A timer rule.
///
/// A rule either pairs a start attribute with an end attribute, in which case the elapsed time is the difference of the
/// two, or names a value attribute that carries the elapsed time directly.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimerRule {
    /// Attribute holding the start time.
    pub start_attr_name: Option<String>,

    /// Attribute holding the end time.
    pub end_attr_name: Option<String>,

    /// Attribute holding the elapsed time.
    pub value_attr_name: Option<String>,

    /// Metric name to use instead of the start (or value) attribute name.
    pub name: Option<String>,

    /// Publish template to use.
    pub publish_template: Option<String>,
}

/// A histogram or set rule.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValueRule {
    /// Metric name to use instead of the attribute name.
    pub name: Option<String>,

    /// Publish template to use.
    pub publish_template: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMain {
    #[serde(deserialize_with = "optional_scalar")]
    app_key: Option<String>,
    #[serde(deserialize_with = "optional_scalar")]
    host: Option<String>,
    port: Option<u16>,
    sample_rate: Option<f64>,
    disabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDocument {
    #[serde(deserialize_with = "nullable")]
    main: RawMain,
    #[serde(deserialize_with = "nullable")]
    publish_templates: IndexMap<String, Vec<String>>,
    #[serde(deserialize_with = "nullable")]
    counters: IndexMap<String, CounterRule>,
    #[serde(deserialize_with = "nullable")]
    gauges: IndexMap<String, GaugeRule>,
    #[serde(deserialize_with = "nullable")]
    timers: Vec<TimerRule>,
    #[serde(deserialize_with = "nullable")]
    histograms: IndexMap<String, ValueRule>,
    #[serde(deserialize_with = "nullable")]
    sets: IndexMap<String, ValueRule>,
}

/// Handler configuration.
///
/// Immutable once a handler has been built from it.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Handler options.
    pub main: MainOptions,

    /// Publish templates.
    pub templates: Templates,

    /// Counter rules, by attribute name.
    pub counters: IndexMap<String, CounterRule>,

    /// Gauge rules, by attribute name.
    pub gauges: IndexMap<String, GaugeRule>,

    /// Timer rules, in document order.
    pub timers: Vec<TimerRule>,

    /// Histogram rules, by attribute name.
    pub histograms: IndexMap<String, ValueRule>,

    /// Set rules, by attribute name.
    pub sets: IndexMap<String, ValueRule>,
}

impl Config {
    /// Loads a configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// If the file cannot be read, or its contents are not a valid configuration document, an error is returned.
    pub fn from_path<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;

        let config = Self::from_yaml_str(&contents)?;
        debug!(path = %path.display(), app_key = %config.main.app_key, "Loaded statsd handler configuration.");

        Ok(config)
    }

    /// Loads a configuration from a reader yielding a YAML document.
    ///
    /// # Errors
    ///
    /// If the document is not a valid configuration document, an error is returned.
    pub fn from_reader<R>(reader: R) -> Result<Self, ConfigError>
    where
        R: Read,
    {
        let raw = serde_yaml::from_reader(reader)?;
        Self::from_raw(raw)
    }

    /// Loads a configuration from a YAML document.
    ///
    /// # Errors
    ///
    /// If the document is not a valid configuration document, an error is returned.
    pub fn from_yaml_str(document: &str) -> Result<Self, ConfigError> {
        let raw = serde_yaml::from_str(document)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDocument) -> Result<Self, ConfigError> {
        let RawMain { app_key, host, port, sample_rate, disabled } = raw.main;
        let defaults = MainOptions::default();
        let main = MainOptions {
            app_key: app_key.filter(|s| !s.is_empty()).unwrap_or(defaults.app_key),
            host: host.filter(|s| !s.is_empty()).unwrap_or(defaults.host),
            port: port.filter(|p| *p != 0).unwrap_or(defaults.port),
            sample_rate: sample_rate.filter(|r| *r != 0.0).unwrap_or(defaults.sample_rate),
            disabled: disabled.unwrap_or(defaults.disabled),
        };

        if !(main.sample_rate > 0.0 && main.sample_rate <= 1.0) {
            return Err(ConfigError::InvalidSampleRate(main.sample_rate));
        }

        let mut templates = Templates::new();
        for (name, formats) in &raw.publish_templates {
            templates.register(name, formats)?;
        }

        Ok(Self {
            main,
            templates,
            counters: raw.counters,
            gauges: raw.gauges,
            timers: raw.timers,
            histograms: raw.histograms,
            sets: raw.sets,
        })
    }
}

/// Scalar YAML values that are accepted wherever a name is expected.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> String {
        let value = match scalar {
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Int(i) => Value::Int(i),
            Scalar::Float(f) => Value::Float(f),
            Scalar::Str(s) => return s,
        };
        value.to_string()
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

fn lookup_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_scalar(deserializer)?.unwrap_or_else(|| DEFAULT_LOOKUP_VALUE.to_string()))
}

fn scalar_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let scalars = Option::<Vec<Scalar>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(scalars.into_iter().map(String::from).collect())
}
