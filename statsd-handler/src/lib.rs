//! A logging handler that turns structured log events into [statsd][statsd] metrics.
//!
//! [statsd]: https://github.com/statsd/statsd/blob/master/docs/metric_types.md
//!
//! # Usage
//!
//! The handler is driven by a YAML configuration that maps event attribute names to metrics: counters, gauges,
//! timers, histograms and sets. Events whose attributes have no rule produce no metrics at all.
//!
//! ```no_run
//! # use statsd_handler::{LogEvent, StatsdHandler};
//! let handler = StatsdHandler::from_yaml_str(
//!     r#"
//! main:
//!   app_key: my_app
//! counters:
//!   REQUEST_METHOD:
//!     value_equals: [GET, PUT]
//! timers:
//!   - start_attr_name: REQUEST_START
//!     end_attr_name: REQUEST_END
//!     name: request_time
//! "#,
//! )
//! .expect("failed to build handler");
//!
//! // Sends `my_app.web;REQUEST_METHOD;PUT:1|c` and `my_app.web;;request_time:42|ms` to localhost:8125.
//! handler.emit(
//!     &LogEvent::new("web")
//!         .with("REQUEST_METHOD", "PUT")
//!         .with("REQUEST_START", 1_000)
//!         .with("REQUEST_END", 1_042),
//! );
//! ```
//!
//! Most applications will not call [`StatsdHandler::emit`] directly, but hook the handler into their logging
//! framework instead:
//!
//! - [`StatsdLayer`] is a `tracing-subscriber` layer, where event fields are the attributes
//! - [`StatsdLogger`] is a `log` logger, where record key-values are the attributes
//!
//! ```no_run
//! # use statsd_handler::{StatsdHandler, StatsdLayer};
//! # use tracing_subscriber::{layer::SubscriberExt as _, Registry};
//! let handler = StatsdHandler::from_path("statsd.yaml").expect("failed to build handler");
//! let subscriber = Registry::default().with(StatsdLayer::new(handler));
//! tracing::subscriber::set_global_default(subscriber).expect("failed to install subscriber");
//!
//! tracing::info!(target: "web", REQUEST_METHOD = "PUT", "handled request");
//! ```
//!
//! # Emission
//!
//! Emitting is best effort. An attribute whose value cannot be used for its metric, or whose metric cannot be sent, is
//! dropped silently, and never prevents the other attributes of the event from being emitted.
//!
//! Metrics are sent through a [`MetricClient`]. By default, this is a [`StatsdClient`] sending plain statsd over UDP
//! through [`cadence`], but metrics can also be routed through a [`metrics`] recorder with [`RecorderClient`], or
//! captured for tests with [`DebuggingClient`].
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]

pub mod client;
pub use self::client::{
    Call, DebuggingClient, GaugeOp, MetricClient, RecorderClient, Snapshotter, StatsdClient, StatsdClientBuilder,
};

mod config;
pub use self::config::{
    Config, CounterRule, CounterValueType, GaugeAction, GaugeRule, MainOptions, TimerRule, ValueRule,
};

mod error;
pub use self::error::{ConfigError, EmitError};

mod event;
pub use self::event::LogEvent;

mod handler;
pub use self::handler::StatsdHandler;

mod layer;
pub use self::layer::StatsdLayer;

mod logger;
pub use self::logger::StatsdLogger;

mod template;
pub use self::template::{Format, PublishTemplate, Templates, DEFAULT_TEMPLATE};

mod timers;

mod value;
pub use self::value::Value;
