use std::{
    borrow::Cow,
    net::{SocketAddr, ToSocketAddrs as _, UdpSocket},
};
#[cfg(unix)]
use std::{os::unix::net::UnixDatagram, path::PathBuf};

#[cfg(unix)]
use cadence::UnixMetricSink;
use cadence::{Counted as _, Gauged as _, Histogrammed as _, MetricSink, Setted as _, Timed as _, UdpMetricSink};
use tracing::debug;

use super::{GaugeOp, MetricClient};
use crate::{config::MainOptions, error::ConfigError, error::EmitError, value::Value};

// Largest magnitude at which every integer is exactly representable as an `f64`.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

#[derive(Clone, Copy)]
enum MetricType {
    Counter,
    Gauge,
    Timing,
    Histogram,
    Set,
}

impl MetricType {
    fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "|c",
            MetricType::Gauge => "|g",
            MetricType::Timing => "|ms",
            MetricType::Histogram => "|h",
            MetricType::Set => "|s",
        }
    }
}

#[derive(Clone, Copy)]
enum MetricValue<'a> {
    Integer(i64),
    Unsigned(u64),
    FloatingPoint(f64),
    Text(&'a str),
}

impl<'a> MetricValue<'a> {
    /// Whole numbers are written without a fractional part.
    fn from_f64(value: f64) -> Self {
        match whole(value) {
            Some(value) => MetricValue::Integer(value),
            None => MetricValue::FloatingPoint(value),
        }
    }

    fn from_value(value: &'a Value) -> Self {
        match value {
            Value::Bool(b) => MetricValue::Text(if *b { "true" } else { "false" }),
            Value::Int(i) => MetricValue::Integer(*i),
            Value::UInt(u) => MetricValue::Unsigned(*u),
            Value::Float(f) => MetricValue::from_f64(*f),
            Value::Str(s) => MetricValue::Text(s),
        }
    }
}

fn whole(value: f64) -> Option<i64> {
    (value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER).then_some(value as i64)
}

fn is_reserved(c: char) -> bool {
    matches!(c, ':' | '|' | '@' | '\n' | '\r')
}

/// Replaces the characters that delimit the line protocol.
fn sanitize(s: &str) -> Cow<'_, str> {
    if s.contains(is_reserved) {
        Cow::Owned(s.replace(is_reserved, "_"))
    } else {
        Cow::Borrowed(s)
    }
}

/// Renders a single statsd line, for the metric shapes `cadence` has no typed API for.
fn format_line(
    prefix: Option<&str>,
    name: &str,
    sign: Option<char>,
    value: MetricValue<'_>,
    metric_type: MetricType,
) -> String {
    let mut int_writer = itoa::Buffer::new();
    let mut float_writer = ryu::Buffer::new();
    let value = match value {
        MetricValue::Integer(v) => int_writer.format(v),
        MetricValue::Unsigned(v) => int_writer.format(v),
        MetricValue::FloatingPoint(v) => float_writer.format(v),
        MetricValue::Text(v) => v,
    };

    let mut line = String::with_capacity(prefix.map_or(0, |p| p.len() + 1) + name.len() + value.len() + 5);
    if let Some(prefix) = prefix {
        line.push_str(prefix);
        line.push('.');
    }
    line.push_str(&sanitize(name));
    line.push(':');
    if let Some(sign) = sign {
        line.push(sign);
    }
    line.push_str(&sanitize(value));
    line.push_str(metric_type.as_str());
    line
}

enum Target {
    Udp(SocketAddr),
    #[cfg(unix)]
    Unixgram(PathBuf),
}

impl Target {
    fn parse(addr: &str) -> Result<Self, String> {
        if let Some((scheme, path)) = addr.split_once("://") {
            return match scheme {
                #[cfg(unix)]
                "unixgram" if !path.is_empty() => Ok(Target::Unixgram(PathBuf::from(path))),
                #[cfg(unix)]
                "unixgram" => Err("socket path must not be empty".to_string()),
                scheme => Err(format!("unsupported scheme '{scheme}'")),
            };
        }

        let addrs = addr.to_socket_addrs().map_err(|e| e.to_string())?.collect::<Vec<_>>();
        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .map(|a| Target::Udp(*a))
            .ok_or_else(|| format!("'{addr}' did not resolve to any address"))
    }

    fn transport_id(&self) -> &'static str {
        match self {
            Target::Udp(_) => "udp",
            #[cfg(unix)]
            Target::Unixgram(_) => "unixgram",
        }
    }
}

/// Builder for a [`StatsdClient`].
pub struct StatsdClientBuilder {
    target: Target,
    prefix: Option<String>,
}

impl StatsdClientBuilder {
    /// Set the remote address to send metrics to.
    ///
    /// For UDP, the address simply needs to be in the format of `<host>:<port>`. On Unix platforms, a datagram socket
    /// can be targeted with an address in the format of `unixgram://<path>`.
    ///
    /// Defaults to sending to `127.0.0.1:8125` over UDP.
    ///
    /// # Errors
    ///
    /// If the given address is not able to be parsed as a valid address, an error will be returned indicating the
    /// reason.
    pub fn with_remote_address<A>(mut self, addr: A) -> Result<Self, ConfigError>
    where
        A: AsRef<str>,
    {
        self.target =
            Target::parse(addr.as_ref()).map_err(|reason| ConfigError::InvalidRemoteAddress { reason })?;
        Ok(self)
    }

    /// Set the namespace prepended to every metric name, separated by a dot.
    ///
    /// An empty prefix disables prefixing. Defaults to no prefix.
    #[must_use]
    pub fn with_prefix<S>(mut self, prefix: S) -> Self
    where
        S: Into<String>,
    {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() { None } else { Some(sanitize(&prefix).into_owned()) };
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// If the local socket cannot be opened, an error is returned.
    pub fn build(self) -> Result<StatsdClient, ConfigError> {
        let prefix = self.prefix.as_deref().unwrap_or("");

        let (client, raw): (cadence::StatsdClient, Box<dyn MetricSink + Send + Sync>) = match &self.target {
            Target::Udp(addr) => {
                let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
                let socket = UdpSocket::bind(bind_addr).map_err(ConfigError::Socket)?;
                socket.set_nonblocking(true).map_err(ConfigError::Socket)?;

                let raw = UdpMetricSink::from(*addr, socket.try_clone().map_err(ConfigError::Socket)?)?;
                let sink = UdpMetricSink::from(*addr, socket)?;
                (cadence::StatsdClient::from_sink(prefix, sink), Box::new(raw))
            }
            #[cfg(unix)]
            Target::Unixgram(path) => {
                let socket = UnixDatagram::unbound().map_err(ConfigError::Socket)?;
                socket.set_nonblocking(true).map_err(ConfigError::Socket)?;

                let raw = UnixMetricSink::from(path, socket.try_clone().map_err(ConfigError::Socket)?);
                let sink = UnixMetricSink::from(path, socket);
                (cadence::StatsdClient::from_sink(prefix, sink), Box::new(raw))
            }
        };

        debug!(transport = self.target.transport_id(), prefix, "Built statsd client.");

        Ok(StatsdClient { client, raw, prefix: self.prefix })
    }
}

impl Default for StatsdClientBuilder {
    fn default() -> Self {
        StatsdClientBuilder { target: Target::Udp(([127, 0, 0, 1], 8125).into()), prefix: None }
    }
}

/// A client that sends metrics to a statsd-compatible daemon using the plain statsd line protocol.
///
/// Metrics are sent through [`cadence`], each as its own datagram, immediately: there is no client-side aggregation or
/// buffering. Relative gauge updates use the `+N`/`-N` form.
pub struct StatsdClient {
    client: cadence::StatsdClient,
    raw: Box<dyn MetricSink + Send + Sync>,
    prefix: Option<String>,
}

impl StatsdClient {
    /// Creates a builder for a `StatsdClient`.
    pub fn builder() -> StatsdClientBuilder {
        StatsdClientBuilder::default()
    }

    /// Creates a client from the handler options: the remote address and the namespace.
    ///
    /// # Errors
    ///
    /// If the remote address cannot be resolved, or the local socket cannot be opened, an error is returned.
    pub fn from_options(options: &MainOptions) -> Result<Self, ConfigError> {
        Self::builder().with_remote_address(options.remote_address())?.with_prefix(options.app_key.clone()).build()
    }

    fn send_line(
        &self,
        name: &str,
        sign: Option<char>,
        value: MetricValue<'_>,
        metric_type: MetricType,
    ) -> Result<(), EmitError> {
        let line = format_line(self.prefix.as_deref(), name, sign, value, metric_type);
        self.raw.emit(&line)?;
        Ok(())
    }
}

impl MetricClient for StatsdClient {
    fn increment(&self, name: &str, amount: f64) -> Result<(), EmitError> {
        match whole(amount) {
            Some(count) => {
                self.client.count(&sanitize(name), count)?;
                Ok(())
            }
            None => self.send_line(name, None, MetricValue::FloatingPoint(amount), MetricType::Counter),
        }
    }

    fn decrement(&self, name: &str, amount: f64) -> Result<(), EmitError> {
        match whole(amount) {
            Some(count) => {
                self.client.count(&sanitize(name), -count)?;
                Ok(())
            }
            None => self.send_line(name, None, MetricValue::FloatingPoint(-amount), MetricType::Counter),
        }
    }

    fn timing(&self, name: &str, millis: f64) -> Result<(), EmitError> {
        match whole(millis) {
            Some(millis) if millis >= 0 => {
                self.client.time(&sanitize(name), millis.unsigned_abs())?;
                Ok(())
            }
            _ => self.send_line(name, None, MetricValue::from_f64(millis), MetricType::Timing),
        }
    }

    fn gauge(&self, name: &str, value: f64, op: GaugeOp) -> Result<(), EmitError> {
        let delta = match op {
            GaugeOp::Set if value >= 0.0 => {
                self.client.gauge(&sanitize(name), value)?;
                return Ok(());
            }
            GaugeOp::Set => {
                // A leading sign means a relative update, so negative values are written by first zeroing the gauge.
                self.send_line(name, None, MetricValue::Integer(0), MetricType::Gauge)?;
                return self.send_line(name, None, MetricValue::from_f64(value), MetricType::Gauge);
            }
            GaugeOp::Increment => value,
            GaugeOp::Decrement => -value,
        };

        let sign = if delta < 0.0 { '-' } else { '+' };
        self.send_line(name, Some(sign), MetricValue::from_f64(delta.abs()), MetricType::Gauge)
    }

    fn histogram(&self, name: &str, value: &Value) -> Result<(), EmitError> {
        match value {
            Value::Int(i) if *i >= 0 => {
                self.client.histogram(&sanitize(name), i.unsigned_abs())?;
            }
            Value::UInt(u) => {
                self.client.histogram(&sanitize(name), *u)?;
            }
            Value::Float(f) if f.is_finite() => {
                self.client.histogram(&sanitize(name), *f)?;
            }
            other => self.send_line(name, None, MetricValue::from_value(other), MetricType::Histogram)?,
        }
        Ok(())
    }

    fn set(&self, name: &str, value: &Value) -> Result<(), EmitError> {
        let member = match value {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        };

        match member {
            Some(member) => {
                self.client.set(&sanitize(name), member)?;
                Ok(())
            }
            None => self.send_line(name, None, MetricValue::from_value(value), MetricType::Set),
        }
    }
}
