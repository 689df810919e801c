use std::path::PathBuf;

use log::LevelFilter;
use statsd_handler::{Call, Config, DebuggingClient, GaugeOp, StatsdHandler, StatsdLogger};

#[test]
fn test_installed_logger() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/config.yaml");
    let config = Config::from_path(path).expect("fixture config should load");

    let client = DebuggingClient::new();
    let snapshotter = client.snapshotter();
    StatsdLogger::new(StatsdHandler::with_client(config, client))
        .install(LevelFilter::Info)
        .expect("no other logger should be installed");

    log::info!(target: "journal", JOURNAL_REQUEST_METHOD_2 = "GET"; "handled request");
    log::info!(target: "journal", JOURNAL_GAUGE_ATTR_DEFAULT = 15; "gauge send");
    log::info!(target: "journal", JOURNAL_REQUEST_START_1 = 1000, JOURNAL_REQUEST_END_1 = 1250; "timed request");
    log::debug!(target: "journal", JOURNAL_REQUEST_METHOD_2 = "PUT"; "filtered out by level");

    assert_eq!(
        snapshotter.snapshot(),
        vec![
            Call::Increment { name: "journal;JOURNAL_REQUEST_METHOD_2;GET".to_string(), amount: 1.0 },
            Call::Gauge {
                name: "journal;JOURNAL_GAUGE_ATTR_DEFAULT;gauge_default_action".to_string(),
                value: 15.0,
                op: GaugeOp::Set
            },
            Call::Timing { name: "journal;;timer_name".to_string(), millis: 250.0 },
        ]
    );
}
