use std::{net::UdpSocket, path::PathBuf, time::Duration};

use statsd_handler::{Call, Config, DebuggingClient, GaugeOp, Snapshotter, StatsdHandler, StatsdLayer, Value};
use tracing::dispatcher::{set_default, DefaultGuard, Dispatch};
use tracing_subscriber::{layer::SubscriberExt as _, Registry};

fn fixture_config() -> Config {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/config.yaml");
    Config::from_path(path).expect("fixture config should load")
}

fn setup_debugging() -> (DefaultGuard, Snapshotter) {
    let client = DebuggingClient::new();
    let snapshotter = client.snapshotter();
    let handler = StatsdHandler::with_client(fixture_config(), client);
    let subscriber = Registry::default().with(StatsdLayer::new(handler));

    (set_default(&Dispatch::new(subscriber)), snapshotter)
}

struct Daemon {
    socket: UdpSocket,
}

impl Daemon {
    fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        Self { socket }
    }

    fn port(&self) -> u16 {
        self.socket.local_addr().unwrap().port()
    }

    fn recv(&self) -> String {
        let mut buf = [0u8; 1024];
        let len = self.socket.recv(&mut buf).unwrap();
        String::from_utf8(buf[..len].to_vec()).unwrap()
    }

    fn recv_all(&self, count: usize) -> Vec<String> {
        (0..count).map(|_| self.recv()).collect()
    }
}

fn setup_udp() -> (DefaultGuard, Daemon) {
    let daemon = Daemon::bind();

    let mut config = fixture_config();
    config.main.host = "127.0.0.1".to_string();
    config.main.port = daemon.port();

    let handler = StatsdHandler::from_config(config).expect("handler should build");
    let subscriber = Registry::default().with(StatsdLayer::new(handler));

    (set_default(&Dispatch::new(subscriber)), daemon)
}

#[test]
fn test_counters_over_udp() {
    let (_guard, daemon) = setup_udp();

    // Not in the allow-list, and then not numeric.
    tracing::info!(target: "journal", JOURNAL_REQUEST_METHOD_2 = "INVALID_KEY", "increment counter");
    tracing::info!(target: "journal", REQUEST_DUR = "many", "increment counter");

    tracing::info!(target: "journal", JOURNAL_REQUEST_METHOD_2 = "PUT", "increment counter");
    assert_eq!(daemon.recv(), "default_app_key.journal;JOURNAL_REQUEST_METHOD_2;PUT:1|c");

    tracing::info!(target: "journal", REQUEST_DUR = -3, "decrement counter");
    assert_eq!(
        daemon.recv_all(3),
        vec![
            "default_app_key.journal;REQUEST_DUR;REQUEST_DUR:-3|c",
            "default_app_key.REQUEST_DUR;REQUEST_DUR:-3|c",
            "default_app_key.REQUEST_DUR:-3|c",
        ]
    );
}

#[test]
fn test_gauges_over_udp() {
    let (_guard, daemon) = setup_udp();

    tracing::info!(target: "journal", JOURNAL_GAUGE_ATTR = tracing::field::Empty, "gauge increment");
    tracing::info!(target: "journal", JOURNAL_GAUGE_ATTR = 42, "gauge increment");
    tracing::info!(target: "journal", JOURNAL_GAUGE_ATTR_DECR = 9000, "gauge decrement");
    tracing::info!(target: "journal", JOURNAL_GAUGE_ATTR_DEFAULT = 15, "gauge send");
    tracing::info!(target: "journal", JOURNAL_GAUGE_ATTR_DEFAULT = -4, "gauge send");

    assert_eq!(
        daemon.recv_all(5),
        vec![
            "default_app_key.journal;JOURNAL_GAUGE_ATTR;gauge_name:+42|g",
            "default_app_key.journal;JOURNAL_GAUGE_ATTR_DECR;gauge_decrement_name:-9000|g",
            "default_app_key.journal;JOURNAL_GAUGE_ATTR_DEFAULT;gauge_default_action:15|g",
            "default_app_key.journal;JOURNAL_GAUGE_ATTR_DEFAULT;gauge_default_action:0|g",
            "default_app_key.journal;JOURNAL_GAUGE_ATTR_DEFAULT;gauge_default_action:-4|g",
        ]
    );
}

#[test]
fn test_timers_over_udp() {
    let (_guard, daemon) = setup_udp();

    tracing::info!(
        target: "journal",
        JOURNAL_REQUEST_START_1 = tracing::field::Empty,
        JOURNAL_REQUEST_END_1 = 42,
        "timer start-end"
    );
    tracing::info!(target: "journal", JOURNAL_REQUEST_START_1 = 0, JOURNAL_REQUEST_END_1 = 42, "timer start-end");
    assert_eq!(daemon.recv(), "default_app_key.journal;;timer_name:42|ms");

    tracing::info!(
        target: "journal",
        JOURNAL_REQUEST_START_1 = 0,
        JOURNAL_REQUEST_END_1 = 42,
        JOURNAL_REQUEST_END_2 = 50,
        "timer start-end"
    );
    assert_eq!(
        daemon.recv_all(2),
        vec!["default_app_key.journal;;timer_name:42|ms", "default_app_key.timer_name_2:50|ms"]
    );

    tracing::info!(target: "journal", JOURNAL_REQUEST_DURATION = 12.5, "timer value");
    assert_eq!(daemon.recv(), "default_app_key.journal;;request_duration:12.5|ms");
}

#[test]
fn test_histograms_and_sets_over_udp() {
    let (_guard, daemon) = setup_udp();

    tracing::info!(target: "journal", JOURNAL_RESPONSE_SIZE = 512, JOURNAL_USER_ID = "ferris", "response");

    assert_eq!(
        daemon.recv_all(2),
        vec![
            "default_app_key.journal;JOURNAL_RESPONSE_SIZE;response_size:512|h",
            "default_app_key.unique_users:ferris|s",
        ]
    );
}

#[test]
fn test_mixed_event() {
    let (_guard, snapshotter) = setup_debugging();

    tracing::info!(
        target: "journal",
        JOURNAL_REQUEST_KIND = tracing::field::Empty,
        JOURNAL_GAUGE_ATTR = 3,
        JOURNAL_REQUEST_START_1 = 100,
        JOURNAL_REQUEST_END_2 = 175,
        UNRELATED = "ignored",
        "handled request"
    );

    assert_eq!(
        snapshotter.snapshot(),
        vec![
            Call::Increment { name: "journal;JOURNAL_REQUEST_KIND;UNKNOWN".to_string(), amount: 1.0 },
            Call::Gauge {
                name: "journal;JOURNAL_GAUGE_ATTR;gauge_name".to_string(),
                value: 3.0,
                op: GaugeOp::Increment
            },
            Call::Timing { name: "timer_name_2".to_string(), millis: 75.0 },
        ]
    );
}

#[test]
fn test_failed_sends_do_not_affect_siblings() {
    let client = DebuggingClient::new().failing_on("journal;JOURNAL_GAUGE_ATTR;gauge_name");
    let snapshotter = client.snapshotter();
    let handler = StatsdHandler::with_client(fixture_config(), client);
    let _guard = set_default(&Dispatch::new(Registry::default().with(StatsdLayer::new(handler))));

    tracing::info!(target: "journal", JOURNAL_GAUGE_ATTR = 3, JOURNAL_USER_ID = 7, "handled request");

    assert_eq!(snapshotter.snapshot(), vec![Call::Set { name: "unique_users".to_string(), value: Value::Int(7) }]);
}

#[test]
fn test_disabled_handler() {
    let mut config = fixture_config();
    config.main.disabled = true;

    let client = DebuggingClient::new();
    let snapshotter = client.snapshotter();
    let handler = StatsdHandler::with_client(config, client);
    let _guard = set_default(&Dispatch::new(Registry::default().with(StatsdLayer::new(handler))));

    tracing::info!(target: "journal", JOURNAL_REQUEST_METHOD_2 = "PUT", JOURNAL_GAUGE_ATTR = 42, "ignored");

    assert!(snapshotter.snapshot().is_empty());
}
