//! Integration with the `tracing` crate.
use std::fmt;

use indexmap::IndexMap;
use tracing_core::{
    field::{Field, Visit},
    span::{Attributes, Id, Record},
    Event, Subscriber,
};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

use crate::{
    client::{MetricClient, StatsdClient},
    event::LogEvent,
    handler::StatsdHandler,
    value::Value,
};

/// Events from this crate are never turned into metrics.
const CRATE_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::");

/// Fields of an event or span, by name.
///
/// Declared fields start out without a value, so fields left as [`tracing::field::Empty`] are still present.
#[derive(Default)]
struct Fields(IndexMap<String, Option<Value>>);

impl Fields {
    fn declared<I>(fields: I) -> Fields
    where
        I: IntoIterator<Item = Field>,
    {
        Fields(fields.into_iter().map(|field| (field.name().to_string(), None)).collect())
    }

    fn insert(&mut self, field: &Field, value: Value) {
        self.0.insert(field.name().to_string(), Some(value));
    }

    fn extend_from(&mut self, other: &Fields) {
        for (name, value) in &other.0 {
            // A value recorded later wins, but a declared-only field never erases one.
            if value.is_some() || !self.0.contains_key(name) {
                self.0.insert(name.clone(), value.clone());
            }
        }
    }
}

impl Visit for Fields {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::Float(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::UInt(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::Str(format!("{value:?}")));
    }
}

/// [`StatsdLayer`] is a [`tracing_subscriber::Layer`] that turns events into metrics.
///
/// Every event is converted to a [`LogEvent`] whose logger name is the event target, and whose attributes are the
/// event fields, and then handed to a [`StatsdHandler`]. Optionally, the fields of the spans the event happened in are
/// added too, from the root span down, with event fields taking precedence.
pub struct StatsdLayer<C = StatsdClient> {
    handler: StatsdHandler<C>,
    span_fields: bool,
}

impl<C> StatsdLayer<C>
where
    C: MetricClient,
{
    /// Creates a new `StatsdLayer` around the given handler.
    pub fn new(handler: StatsdHandler<C>) -> Self {
        Self { handler, span_fields: false }
    }

    /// Sets whether or not the fields of enclosing spans are added to events.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn with_span_fields(mut self, enabled: bool) -> Self {
        self.span_fields = enabled;
        self
    }

    /// Returns the handler of this layer.
    pub fn handler(&self) -> &StatsdHandler<C> {
        &self.handler
    }
}

impl<S, C> Layer<S> for StatsdLayer<C>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    C: MetricClient + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, cx: Context<'_, S>) {
        if !self.span_fields {
            return;
        }
        let Some(span) = cx.span(id) else {
            return;
        };

        let mut fields = Fields::declared(attrs.metadata().fields());
        attrs.record(&mut fields);
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, cx: Context<'_, S>) {
        if !self.span_fields {
            return;
        }
        let Some(span) = cx.span(id) else {
            return;
        };

        let mut recorded = Fields::default();
        values.record(&mut recorded);

        let mut ext = span.extensions_mut();
        if let Some(existing) = ext.get_mut::<Fields>() {
            existing.extend_from(&recorded);
        } else {
            ext.insert(recorded);
        }
    }

    fn on_event(&self, event: &Event<'_>, cx: Context<'_, S>) {
        let metadata = event.metadata();
        if self.handler.is_disabled() || metadata.target().starts_with(CRATE_TARGET) {
            return;
        }

        let mut fields = Fields::default();
        if self.span_fields {
            if let Some(scope) = cx.event_scope(event) {
                for span in scope.from_root() {
                    if let Some(span_fields) = span.extensions().get::<Fields>() {
                        fields.extend_from(span_fields);
                    }
                }
            }
        }

        let mut event_fields = Fields::declared(metadata.fields());
        event.record(&mut event_fields);
        fields.extend_from(&event_fields);

        let mut log_event = LogEvent::new(metadata.target());
        for (name, value) in fields.0 {
            log_event.insert(name, value);
        }
        self.handler.emit(&log_event);
    }
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::{layer::SubscriberExt as _, Registry};

    use super::StatsdLayer;
    use crate::{
        client::{Call, DebuggingClient, GaugeOp, Snapshotter},
        config::Config,
        handler::StatsdHandler,
        value::Value,
    };

    const CONFIG: &str = r#"
publish_templates:
  short:
    - "%(logger)s.%(metric_name)s"

counters:
  REQUEST_METHOD:
    publish_template: short
  REQUEST_KIND:
    lookup_value: unknown
    publish_template: short

gauges:
  QUEUE_DEPTH:
    publish_template: short

timers:
  - start_attr_name: START
    end_attr_name: END
    name: request_time
    publish_template: short
"#;

    fn layer(span_fields: bool) -> (StatsdLayer<DebuggingClient>, Snapshotter) {
        let client = DebuggingClient::new();
        let snapshotter = client.snapshotter();
        let handler = StatsdHandler::with_client(Config::from_yaml_str(CONFIG).unwrap(), client);
        (StatsdLayer::new(handler).with_span_fields(span_fields), snapshotter)
    }

    #[test]
    fn event_fields_become_attributes() {
        let (layer, snapshotter) = layer(false);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "app", REQUEST_METHOD = "PUT", QUEUE_DEPTH = 15_u64, "handled request");
            tracing::info!(target: "app", START = 10, END = 52.5, "timed request");
        });

        assert_eq!(
            snapshotter.snapshot(),
            vec![
                Call::Increment { name: "app.PUT".to_string(), amount: 1.0 },
                Call::Gauge { name: "app.QUEUE_DEPTH".to_string(), value: 15.0, op: GaugeOp::Set },
                Call::Timing { name: "app.request_time".to_string(), millis: 42.5 },
            ]
        );
    }

    #[test]
    fn empty_fields_are_present_without_value() {
        let (layer, snapshotter) = layer(false);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "app", REQUEST_KIND = tracing::field::Empty);
        });

        assert_eq!(snapshotter.snapshot(), vec![Call::Increment { name: "app.unknown".to_string(), amount: 1.0 }]);
    }

    #[test]
    fn span_fields() {
        let (layer, snapshotter) = layer(true);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("request", REQUEST_METHOD = tracing::field::Empty, START = 100);
            let _enter = span.enter();
            span.record("REQUEST_METHOD", "GET");

            tracing::info!(target: "app", END = 130, "done");
        });

        assert_eq!(
            snapshotter.snapshot(),
            vec![
                Call::Increment { name: "app.GET".to_string(), amount: 1.0 },
                Call::Timing { name: "app.request_time".to_string(), millis: 30.0 },
            ]
        );
    }

    #[test]
    fn span_fields_ignored_by_default() {
        let (layer, snapshotter) = layer(false);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("request", REQUEST_METHOD = "GET");
            let _enter = span.enter();
            tracing::info!(target: "app", "done");
        });

        assert!(snapshotter.snapshot().is_empty());
    }

    #[test]
    fn own_events_are_ignored() {
        let (layer, snapshotter) = layer(false);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: "statsd_handler::handler", REQUEST_METHOD = "PUT");
            tracing::debug!(target: "app", REQUEST_METHOD = "PUT");
        });

        assert_eq!(snapshotter.snapshot(), vec![Call::Increment { name: "app.PUT".to_string(), amount: 1.0 }]);
    }

    #[test]
    fn targets_sharing_the_crate_name_prefix_are_kept() {
        let (layer, snapshotter) = layer(false);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "statsd_handler", REQUEST_METHOD = "PUT");
            tracing::info!(target: "statsd_handler_app", REQUEST_METHOD = "GET");
        });

        assert_eq!(
            snapshotter.snapshot(),
            vec![
                Call::Increment { name: "statsd_handler.PUT".to_string(), amount: 1.0 },
                Call::Increment { name: "statsd_handler_app.GET".to_string(), amount: 1.0 },
            ]
        );
    }

    #[test]
    fn debug_values_are_strings() {
        let client = DebuggingClient::new();
        let snapshotter = client.snapshotter();
        let config = Config::from_yaml_str("sets:\n  USER:\n    publish_template: default\n").unwrap();
        let layer = StatsdLayer::new(StatsdHandler::with_client(config, client));

        tracing::subscriber::with_default(Registry::default().with(layer), || {
            tracing::info!(target: "app", USER = ?("ferris", 1));
        });

        assert_eq!(
            snapshotter.snapshot(),
            vec![Call::Set { name: "app;USER;USER".to_string(), value: Value::from("(\"ferris\", 1)") }]
        );
    }
}
