use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use metadata::{Lookup, Metadata, MetadataClient};
use prometheus::core::{Collector, Desc};
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use serde_derive::Deserialize;

use crate::metrics;

pub const AVAILABILITY_ZONE_PATH: &str = "placement/availability-zone";
pub const HOSTNAME_PATH: &str = "hostname";
pub const INSTANCE_ID_PATH: &str = "instance-id";
pub const INSTANCE_TYPE_PATH: &str = "instance-type";
pub const INSTANCE_ACTION_PATH: &str = "spot/instance-action";

// cf. https://docs.aws.amazon.com/AWSEC2/latest/UserGuide/spot-instance-termination-notices.html
// {"action": "terminate", "time": "2017-09-18T08:22:00Z"}
#[derive(Debug, Deserialize, PartialEq)]
pub struct InstanceAction {
    pub action: String,
    pub time:   DateTime<Utc>,
}

/// Label values identifying the instance, fetched fresh on every scrape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstanceLabels {
    pub availability_zone: String,
    pub hostname:          String,
    pub instance_id:       String,
    pub instance_type:     String,
}

impl InstanceLabels {
    /// Fetches all labels; unavailable values become empty strings.
    pub fn fetch<M: Metadata>(metadata: &M) -> InstanceLabels {
        InstanceLabels {
            availability_zone: metadata.get_metadata(AVAILABILITY_ZONE_PATH).into_label_value(),
            hostname:          metadata.get_metadata(HOSTNAME_PATH).into_label_value(),
            instance_id:       metadata.get_metadata(INSTANCE_ID_PATH).into_label_value(),
            instance_type:     metadata.get_metadata(INSTANCE_TYPE_PATH).into_label_value(),
        }
    }

    /// Values in the order of `metrics::INSTANCE_LABELS`.
    fn values(&self) -> Vec<&str> {
        vec![
            self.availability_zone.as_str(),
            self.hostname.as_str(),
            self.instance_id.as_str(),
            self.instance_type.as_str(),
        ]
    }
}

/// Reports whether a spot termination notice has been issued for this instance.
pub struct TerminationCollector<M> {
    metadata:             M,
    termination_imminent: Desc,
    termination_in:       Desc,
}

impl TerminationCollector<MetadataClient> {
    pub fn with_endpoint(endpoint: &str) -> Self { TerminationCollector::new(MetadataClient::new(endpoint)) }
}

impl<M: Metadata> TerminationCollector<M> {
    pub fn new(metadata: M) -> Self {
        TerminationCollector {
            metadata,
            termination_imminent: gauge_desc(
                metrics::TERMINATION_IMMINENT,
                metrics::TERMINATION_IMMINENT_HELP,
                metrics::termination_imminent_labels(),
            ),
            termination_in: gauge_desc(
                metrics::TERMINATION_IN,
                metrics::TERMINATION_IN_HELP,
                metrics::termination_in_labels(),
            ),
        }
    }

    /// Runs one scrape cycle; `now` is the reference point for the time until termination.
    pub fn scrape_at(&self, now: DateTime<Utc>) -> Vec<MetricFamily> {
        info!("Fetching termination data from metadata service.");

        let instance = InstanceLabels::fetch(&self.metadata);

        let body = match self.metadata.get_metadata(INSTANCE_ACTION_PATH) {
            Lookup::Failed(err) => {
                error!("Failed to fetch data from metadata service: {}", err);
                return Vec::new();
            }
            Lookup::NotFound => None,
            Lookup::Found(ref body) if body.is_empty() => None,
            Lookup::Found(body) => Some(body),
        };

        let body = match body {
            Some(body) => body,
            None => {
                debug!("No instance-action available.");
                return vec![self.imminent_family(&instance, 0.0, "")];
            }
        };

        // The value may be present but not be a valid notice, so a parse error is not fatal.
        let instance_action = match serde_json::from_str::<InstanceAction>(&body) {
            Ok(instance_action) => instance_action,
            Err(e) => {
                error!("Couldn't parse instance-action metadata: {}", e);
                return vec![self.imminent_family(&instance, 0.0, "")];
            }
        };
        info!(
            "instance-action endpoint available, action: {}, termination time: {}",
            instance_action.action, instance_action.time
        );

        let mut families = vec![self.imminent_family(&instance, 1.0, &instance_action.action)];
        let remaining = seconds_until(instance_action.time, now);
        if remaining > 0.0 {
            families.push(self.time_family(&instance, remaining));
        } else {
            debug!("Termination time {} has already passed.", instance_action.time);
        }

        families
    }

    fn imminent_family(&self, instance: &InstanceLabels, value: f64, action: &str) -> MetricFamily {
        let mut values = instance.values();
        values.push(action);
        gauge_family(&self.termination_imminent, value, &values)
    }

    fn time_family(&self, instance: &InstanceLabels, seconds: f64) -> MetricFamily {
        gauge_family(&self.termination_in, seconds, &instance.values())
    }
}

impl<M: Metadata + Send + Sync> Collector for TerminationCollector<M> {
    fn desc(&self) -> Vec<&Desc> { vec![&self.termination_imminent, &self.termination_in] }

    fn collect(&self) -> Vec<MetricFamily> { self.scrape_at(Utc::now()) }
}

/// Seconds from `now` until `time` with millisecond resolution; negative once `time` has passed.
fn seconds_until(time: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    time.signed_duration_since(now).num_milliseconds() as f64 / 1000.0
}

fn gauge_desc(name: &str, help: &str, labels: Vec<String>) -> Desc {
    // Names and labels are constants known to be valid.
    Desc::new(name.to_string(), help.to_string(), labels, HashMap::new()).expect("valid metric descriptor")
}

/// Builds a single sample family for `desc`; `values` must follow the order of `desc.variable_labels`.
fn gauge_family(desc: &Desc, value: f64, values: &[&str]) -> MetricFamily {
    let mut labels: Vec<LabelPair> = desc
        .variable_labels
        .iter()
        .zip(values)
        .map(|(name, value)| {
            let mut pair = LabelPair::default();
            pair.set_name(name.clone());
            pair.set_value(value.to_string());
            pair
        })
        .collect();
    labels.sort_by(|a, b| a.get_name().cmp(b.get_name()));

    let mut gauge = Gauge::default();
    gauge.set_value(value);

    let mut metric = Metric::default();
    metric.set_label(labels.into());
    metric.set_gauge(gauge);

    let mut family = MetricFamily::default();
    family.set_name(desc.fq_name.clone());
    family.set_help(desc.help.clone());
    family.set_field_type(MetricType::GAUGE);
    family.set_metric(vec![metric].into());

    family
}
