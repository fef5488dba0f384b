//! The JSON document published to the broker.
//!
//! Field names are camelCase to match what existing dashboards consume.
//! Every statistics node carries `uniqueId`, `msgCount` and
//! `averageTimeTaken`; labels are included only when known.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use stepwatch_types::{
    ActivitySnapshot, AdapterActivity, ChannelActivity, EndpointActivity, ServiceActivity,
    WorkflowActivity,
};

/// A timestamped activity snapshot, shaped for the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardDocument {
    /// When the snapshot was taken, as RFC 3339.
    pub datetimestamp: DateTime<Utc>,
    pub adapter_metrics: AdapterMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterMetrics {
    pub adapters: BTreeMap<String, AdapterDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterDocument {
    pub unique_id: String,
    pub channels: BTreeMap<String, ChannelDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDocument {
    pub unique_id: String,
    pub workflows: BTreeMap<String, WorkflowDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    pub unique_id: String,
    pub message_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<EndpointDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<EndpointDocument>,
    pub services: BTreeMap<String, ServiceDocument>,
}

/// A producer or consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDocument {
    pub unique_id: String,
    pub msg_count: u64,
    pub average_time_taken: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_impl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDocument {
    pub unique_id: String,
    pub msg_count: u64,
    pub average_time_taken: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<String, ServiceDocument>,
}

impl ForwardDocument {
    /// Shape a snapshot for publishing.
    ///
    /// The document is stamped with the snapshot's own timestamp, falling
    /// back to the current time if that timestamp is out of range.
    pub fn from_snapshot(snapshot: &ActivitySnapshot) -> Self {
        let datetimestamp = i64::try_from(snapshot.timestamp_ms)
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        Self {
            datetimestamp,
            adapter_metrics: AdapterMetrics {
                adapters: snapshot
                    .adapters
                    .iter()
                    .map(|(id, adapter)| (id.clone(), AdapterDocument::from(adapter)))
                    .collect(),
            },
        }
    }

    /// Pretty-printed JSON, as published.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl From<&AdapterActivity> for AdapterDocument {
    fn from(adapter: &AdapterActivity) -> Self {
        Self {
            unique_id: adapter.unique_id.clone(),
            channels: adapter
                .channels
                .iter()
                .map(|(id, channel)| (id.clone(), ChannelDocument::from(channel)))
                .collect(),
        }
    }
}

impl From<&ChannelActivity> for ChannelDocument {
    fn from(channel: &ChannelActivity) -> Self {
        Self {
            unique_id: channel.unique_id.clone(),
            workflows: channel
                .workflows
                .iter()
                .map(|(id, workflow)| (id.clone(), WorkflowDocument::from(workflow)))
                .collect(),
        }
    }
}

impl From<&WorkflowActivity> for WorkflowDocument {
    fn from(workflow: &WorkflowActivity) -> Self {
        Self {
            unique_id: workflow.unique_id.clone(),
            message_ids: workflow.message_ids.iter().cloned().collect(),
            producer: workflow.producer.as_ref().map(EndpointDocument::from),
            consumer: workflow.consumer.as_ref().map(EndpointDocument::from),
            services: services(&workflow.services),
        }
    }
}

impl From<&EndpointActivity> for EndpointDocument {
    fn from(endpoint: &EndpointActivity) -> Self {
        Self {
            unique_id: endpoint.unique_id.clone(),
            msg_count: endpoint.stats.message_count,
            average_time_taken: endpoint.stats.avg_ms_taken,
            class_name: endpoint.class_name.clone(),
            vendor_impl: endpoint.vendor_impl.clone(),
            destination: endpoint.destination.clone(),
        }
    }
}

impl From<&ServiceActivity> for ServiceDocument {
    fn from(service: &ServiceActivity) -> Self {
        Self {
            unique_id: service.unique_id.clone(),
            msg_count: service.stats.message_count,
            average_time_taken: service.stats.avg_ms_taken,
            class_name: service.class_name.clone(),
            services: services(&service.services),
        }
    }
}

fn services(services: &BTreeMap<String, ServiceActivity>) -> BTreeMap<String, ServiceDocument> {
    services
        .iter()
        .map(|(id, service)| (id.clone(), ServiceDocument::from(service)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn snapshot() -> ActivitySnapshot {
        ActivitySnapshot::builder()
            .timestamp_ms(1_700_000_000_000)
            .adapter("A", |a| {
                a.channel("C", |c| {
                    c.workflow("W", |w| {
                        w.message_id("m1")
                            .message_id("m2")
                            .consumer("Cons", |e| {
                                e.class_name("JmsConsumer")
                                    .destination("queue://in")
                                    .step("m1", 3)
                                    .step("m2", 4)
                            })
                            .service("outer", |s| {
                                s.class_name("ServiceList")
                                    .service("inner", |s| s.class_name("Log").step("m1", 10))
                            })
                    })
                })
            })
            .build()
    }

    #[test]
    fn document_uses_camel_case_field_names() {
        let json: Value =
            serde_json::from_str(&ForwardDocument::from_snapshot(&snapshot()).to_json().unwrap())
                .unwrap();

        let workflow = &json["adapterMetrics"]["adapters"]["A"]["channels"]["C"]["workflows"]["W"];
        assert_eq!(workflow["uniqueId"], "W");
        assert_eq!(workflow["messageIds"], serde_json::json!(["m1", "m2"]));

        let consumer = &workflow["consumer"];
        assert_eq!(consumer["msgCount"], 2);
        assert_eq!(consumer["averageTimeTaken"], 3);
        assert_eq!(consumer["className"], "JmsConsumer");
        assert!(consumer.get("vendorImpl").is_none());
        assert!(workflow.get("producer").is_none());

        let inner = &workflow["services"]["outer"]["services"]["inner"];
        assert_eq!(inner["msgCount"], 1);
        assert_eq!(inner["averageTimeTaken"], 10);
        assert!(inner.get("services").is_none());
    }

    #[test]
    fn timestamp_comes_from_snapshot() {
        let document = ForwardDocument::from_snapshot(&snapshot());
        let json: Value = serde_json::to_value(&document).unwrap();

        assert_eq!(json["datetimestamp"], "2023-11-14T22:13:20Z");
    }

    #[test]
    fn out_of_range_timestamp_falls_back_to_now() {
        let before = Utc::now();
        let document = ForwardDocument::from_snapshot(&ActivitySnapshot::with_timestamp(u64::MAX));

        assert!(document.datetimestamp >= before);
    }

    #[test]
    fn empty_snapshot_has_empty_adapters() {
        let document = ForwardDocument::from_snapshot(&ActivitySnapshot::with_timestamp(0));
        assert!(document.adapter_metrics.adapters.is_empty());
    }
}
