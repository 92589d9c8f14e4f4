use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metadata::{Lookup, Metadata, MetadataClient};
use prometheus::core::Collector;
use spectral::prelude::*;
use spot_termination_exporter::collector::TerminationCollector;
use spot_termination_exporter::config::{ConfigOverrides, ExporterConfig};
use spot_termination_exporter::server;
use tokio::runtime::Runtime;
use warp::http::StatusCode;
use warp::Filter;

/// Metadata service look-alike listening on an ephemeral localhost port.
struct FakeMetadataService {
    runtime: Runtime,
    address: SocketAddr,
}

impl FakeMetadataService {
    /// `instance_action` is the body of `spot/instance-action`; `None` answers 404.
    fn start(instance_action: Option<&'static str>) -> FakeMetadataService {
        let runtime = Runtime::new().expect("tokio runtime");

        let availability_zone =
            warp::path!("latest" / "meta-data" / "placement" / "availability-zone").map(|| "eu-central-1a");
        let hostname = warp::path!("latest" / "meta-data" / "hostname").map(|| "ip-10-0-0-1");
        let instance_id = warp::path!("latest" / "meta-data" / "instance-id").map(|| "i-0123456789abcdef0");
        let instance_type = warp::path!("latest" / "meta-data" / "instance-type").map(|| "m5.large");
        let action = warp::path!("latest" / "meta-data" / "spot" / "instance-action").and_then(move || async move {
            match instance_action {
                Some(body) => Ok(body),
                None => Err(warp::reject::not_found()),
            }
        });
        let broken = warp::path!("latest" / "meta-data" / "broken")
            .map(|| warp::reply::with_status("internal error", StatusCode::INTERNAL_SERVER_ERROR));
        let slow = warp::path!("latest" / "meta-data" / "slow").and_then(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok::<_, Infallible>("late")
        });
        let routes = availability_zone
            .or(hostname)
            .or(instance_id)
            .or(instance_type)
            .or(action)
            .or(broken)
            .or(slow);

        let address = runtime.block_on(async move {
            let (address, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
            tokio::spawn(server);
            address
        });

        FakeMetadataService { runtime, address }
    }

    fn endpoint(&self) -> String { format!("http://{}/latest/meta-data/", self.address) }
}

fn label<'a>(metric: &'a prometheus::proto::Metric, name: &str) -> Option<&'a str> {
    metric
        .get_label()
        .iter()
        .find(|l| l.get_name() == name)
        .map(|l| l.get_value())
}

#[test]
fn client_returns_body() {
    testing::setup();
    let service = FakeMetadataService::start(None);
    let client = MetadataClient::new(&service.endpoint());

    let lookup = client.get_metadata("instance-id");

    assert_that(&lookup).is_equal_to(Lookup::Found("i-0123456789abcdef0".to_string()));
}

#[test]
fn client_reports_missing_key_as_not_found() {
    testing::setup();
    let service = FakeMetadataService::start(None);
    let client = MetadataClient::new(&service.endpoint());

    let lookup = client.get_metadata("spot/instance-action");

    assert_that(&lookup).is_equal_to(Lookup::NotFound);
}

#[test]
fn client_passes_body_of_other_status_codes() {
    testing::setup();
    let service = FakeMetadataService::start(None);
    let client = MetadataClient::new(&service.endpoint());

    let lookup = client.get_metadata("broken");

    assert_that(&lookup).is_equal_to(Lookup::Found("internal error".to_string()));
}

#[test]
fn client_gives_up_after_timeout() {
    testing::setup();
    let service = FakeMetadataService::start(None);
    let client = MetadataClient::new(&service.endpoint());

    let start = Instant::now();
    let lookup = client.get_metadata("slow");

    match lookup {
        Lookup::Failed(_) => {}
        other => panic!("expected failure, got {:?}", other),
    }
    assert_that(&start.elapsed()).is_less_than(Duration::from_millis(1900));
}

#[test]
fn collector_reads_notice_from_service() {
    testing::setup();
    let service = FakeMetadataService::start(Some(r#"{"action": "terminate", "time": "2099-01-01T00:00:00Z"}"#));
    let collector = TerminationCollector::with_endpoint(&service.endpoint());

    let families = collector.collect();

    assert_that(&families).has_length(2);
    let imminent = families[0].get_metric().first().expect("indicator sample");
    assert_that(&imminent.get_gauge().get_value()).is_equal_to(1.0);
    assert_that(&label(imminent, "instance_action")).is_equal_to(Some("terminate"));
    assert_that(&label(imminent, "availability_zone")).is_equal_to(Some("eu-central-1a"));
    assert_that(&label(imminent, "instance_type")).is_equal_to(Some("m5.large"));
    let remaining = families[1].get_metric().first().expect("time sample");
    assert_that(&remaining.get_gauge().get_value()).is_greater_than(0.0);
}

#[test]
fn collector_emits_nothing_when_service_is_unreachable() {
    testing::setup();
    let collector = TerminationCollector::with_endpoint("http://127.0.0.1:1/latest/meta-data/");

    let families = collector.collect();

    assert_that(&families).is_empty();
}

#[test]
fn exporter_serves_metrics_and_landing_page() {
    testing::setup();
    let service = FakeMetadataService::start(None);
    let overrides = ConfigOverrides {
        bind_address:      Some("127.0.0.1:0".to_string()),
        metadata_endpoint: Some(service.endpoint()),
        ..Default::default()
    };
    let config = ExporterConfig::load(None::<&str>, overrides).expect("valid config");
    let registry = spot_termination_exporter::registry(&config).expect("registry");
    let bind_address = config.bind_address().expect("bind address");
    let metrics_path = config.listen.metrics_path.clone();
    let address = service.runtime.block_on(async move {
        let (address, exporter) = server::bind(bind_address, &metrics_path, registry).expect("exporter binds");
        tokio::spawn(exporter);
        address
    });

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("http client");

    let mut metrics = client
        .get(&format!("http://{}/metrics", address))
        .send()
        .expect("metrics response");
    assert_that(&metrics.status()).is_equal_to(reqwest::StatusCode::OK);
    let text = metrics.text().expect("metrics body");
    assert_that(&text).contains(r#"instance_id="i-0123456789abcdef0""#);
    assert_that(&text).contains(r#"instance_action="""#);

    let mut landing = client.get(&format!("http://{}/", address)).send().expect("landing response");
    assert_that(&landing.status()).is_equal_to(reqwest::StatusCode::OK);
    assert_that(&landing.text().expect("landing body")).contains("/metrics");

    let missing = client
        .get(&format!("http://{}/nothing", address))
        .send()
        .expect("missing response");
    assert_that(&missing.status()).is_equal_to(reqwest::StatusCode::NOT_FOUND);
}
