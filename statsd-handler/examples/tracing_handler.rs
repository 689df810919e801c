use std::time::{Duration, Instant};

use statsd_handler::{StatsdHandler, StatsdLayer};
use tracing_subscriber::{layer::SubscriberExt as _, Registry};

const CONFIG: &str = r#"
main:
  app_key: example
  host: localhost
  port: 9125

counters:
  REQUEST_METHOD:
    value_equals: [GET, PUT]

gauges:
  QUEUE_DEPTH:
    name: queue_depth

timers:
  - value_attr_name: REQUEST_MILLIS
    name: request_time
"#;

fn main() {
    let handler = StatsdHandler::from_yaml_str(CONFIG).expect("failed to build statsd handler");
    let subscriber = Registry::default()
        .with(tracing_subscriber::fmt::layer())
        .with(StatsdLayer::new(handler));
    tracing::subscriber::set_global_default(subscriber).expect("failed to install subscriber");

    let methods = ["GET", "PUT", "DELETE"];
    let mut depth = 0_u64;
    let mut last_update = Instant::now();
    for i in 0.. {
        let started = Instant::now();
        std::thread::sleep(Duration::from_millis(100));

        tracing::info!(
            target: "example",
            REQUEST_METHOD = methods[i % methods.len()],
            REQUEST_MILLIS = started.elapsed().as_secs_f64() * 1000.0,
            "handled request"
        );

        if last_update.elapsed() > Duration::from_secs(5) {
            depth = (depth + 7) % 50;
            tracing::info!(target: "example", QUEUE_DEPTH = depth, "queue depth");
            last_update = Instant::now();
        }
    }
}
