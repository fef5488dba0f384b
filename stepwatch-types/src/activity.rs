//! Activity records for each level of the monitored component hierarchy.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;

use crate::StepStats;

/// Activity of a single adapter, the root of a topology.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct AdapterActivity {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub unique_id: String,

    /// Channels keyed by unique id.
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(1))]
    pub channels: BTreeMap<String, ChannelActivity>,
}

impl AdapterActivity {
    pub fn new(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            channels: BTreeMap::new(),
        }
    }

    /// Create a builder for an adapter record.
    pub fn builder(unique_id: impl Into<String>) -> AdapterActivityBuilder {
        AdapterActivityBuilder::new(unique_id)
    }

    /// Find a workflow anywhere under this adapter.
    pub fn workflow(&self, unique_id: &str) -> Option<&WorkflowActivity> {
        self.channels
            .values()
            .find_map(|channel| channel.workflows.get(unique_id))
    }
}

/// Activity of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct ChannelActivity {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub unique_id: String,

    /// Unique id of the owning adapter.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub parent_id: String,

    /// Workflows keyed by unique id.
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(2))]
    pub workflows: BTreeMap<String, WorkflowActivity>,
}

/// Activity of a workflow.
///
/// `message_ids` is the set of distinct messages that passed through any
/// component of the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct WorkflowActivity {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub unique_id: String,

    /// Unique id of the owning channel.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub parent_id: String,

    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(2))]
    pub message_ids: BTreeSet<String>,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    #[cfg_attr(feature = "minicbor", n(3))]
    pub producer: Option<EndpointActivity>,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    #[cfg_attr(feature = "minicbor", n(4))]
    pub consumer: Option<EndpointActivity>,

    /// Top-level services keyed by unique id.
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(5))]
    pub services: BTreeMap<String, ServiceActivity>,
}

impl WorkflowActivity {
    /// Find a service at any nesting depth under this workflow.
    pub fn service(&self, unique_id: &str) -> Option<&ServiceActivity> {
        find_service(&self.services, unique_id)
    }
}

/// Activity of a service, possibly a composite holding nested services.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct ServiceActivity {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub unique_id: String,

    /// Unique id of the owning workflow or enclosing service.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub parent_id: String,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    #[cfg_attr(feature = "minicbor", n(2))]
    pub class_name: Option<String>,

    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(3))]
    pub stats: StepStats,

    /// Nested services keyed by unique id.
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(4))]
    pub services: BTreeMap<String, ServiceActivity>,
}

impl ServiceActivity {
    /// Find a service nested at any depth below this one.
    pub fn service(&self, unique_id: &str) -> Option<&ServiceActivity> {
        find_service(&self.services, unique_id)
    }
}

/// Activity of a workflow producer or consumer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct EndpointActivity {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub unique_id: String,

    /// Unique id of the owning workflow.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub parent_id: String,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    #[cfg_attr(feature = "minicbor", n(2))]
    pub class_name: Option<String>,

    /// Label of the vendor implementation behind the endpoint.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    #[cfg_attr(feature = "minicbor", n(3))]
    pub vendor_impl: Option<String>,

    /// Destination the endpoint reads from or writes to.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    #[cfg_attr(feature = "minicbor", n(4))]
    pub destination: Option<String>,

    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(5))]
    pub stats: StepStats,
}

/// Depth-first search through a service map and everything nested in it.
pub(crate) fn find_service<'a>(
    services: &'a BTreeMap<String, ServiceActivity>,
    unique_id: &str,
) -> Option<&'a ServiceActivity> {
    if let Some(found) = services.get(unique_id) {
        return Some(found);
    }
    services
        .values()
        .find_map(|service| find_service(&service.services, unique_id))
}

// ============================================================================
// Builders
// ============================================================================

/// Builder for `AdapterActivity`.
#[derive(Debug)]
pub struct AdapterActivityBuilder {
    activity: AdapterActivity,
}

impl AdapterActivityBuilder {
    pub fn new(unique_id: impl Into<String>) -> Self {
        Self {
            activity: AdapterActivity::new(unique_id),
        }
    }

    /// Add a channel built using a closure.
    pub fn channel<F>(mut self, unique_id: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(ChannelActivityBuilder) -> ChannelActivityBuilder,
    {
        let builder = ChannelActivityBuilder::new(unique_id, &self.activity.unique_id);
        let channel = f(builder).build();
        self.activity
            .channels
            .insert(channel.unique_id.clone(), channel);
        self
    }

    pub fn build(self) -> AdapterActivity {
        self.activity
    }
}

/// Builder for `ChannelActivity`.
#[derive(Debug)]
pub struct ChannelActivityBuilder {
    activity: ChannelActivity,
}

impl ChannelActivityBuilder {
    pub fn new(unique_id: impl Into<String>, parent_id: &str) -> Self {
        Self {
            activity: ChannelActivity {
                unique_id: unique_id.into(),
                parent_id: parent_id.into(),
                workflows: BTreeMap::new(),
            },
        }
    }

    /// Add a workflow built using a closure.
    pub fn workflow<F>(mut self, unique_id: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(WorkflowActivityBuilder) -> WorkflowActivityBuilder,
    {
        let builder = WorkflowActivityBuilder::new(unique_id, &self.activity.unique_id);
        let workflow = f(builder).build();
        self.activity
            .workflows
            .insert(workflow.unique_id.clone(), workflow);
        self
    }

    pub fn build(self) -> ChannelActivity {
        self.activity
    }
}

/// Builder for `WorkflowActivity`.
#[derive(Debug)]
pub struct WorkflowActivityBuilder {
    activity: WorkflowActivity,
}

impl WorkflowActivityBuilder {
    pub fn new(unique_id: impl Into<String>, parent_id: &str) -> Self {
        Self {
            activity: WorkflowActivity {
                unique_id: unique_id.into(),
                parent_id: parent_id.into(),
                ..Default::default()
            },
        }
    }

    /// Mark a message as seen by this workflow.
    pub fn message_id(mut self, message_id: impl Into<String>) -> Self {
        self.activity.message_ids.insert(message_id.into());
        self
    }

    /// Set the producer, built using a closure.
    pub fn producer<F>(mut self, unique_id: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(EndpointActivityBuilder) -> EndpointActivityBuilder,
    {
        let builder = EndpointActivityBuilder::new(unique_id, &self.activity.unique_id);
        self.activity.producer = Some(f(builder).build());
        self
    }

    /// Set the consumer, built using a closure.
    pub fn consumer<F>(mut self, unique_id: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(EndpointActivityBuilder) -> EndpointActivityBuilder,
    {
        let builder = EndpointActivityBuilder::new(unique_id, &self.activity.unique_id);
        self.activity.consumer = Some(f(builder).build());
        self
    }

    /// Add a top-level service built using a closure.
    pub fn service<F>(mut self, unique_id: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(ServiceActivityBuilder) -> ServiceActivityBuilder,
    {
        let builder = ServiceActivityBuilder::new(unique_id, &self.activity.unique_id);
        let service = f(builder).build();
        self.activity
            .services
            .insert(service.unique_id.clone(), service);
        self
    }

    pub fn build(self) -> WorkflowActivity {
        self.activity
    }
}

/// Builder for `ServiceActivity`.
#[derive(Debug)]
pub struct ServiceActivityBuilder {
    activity: ServiceActivity,
}

impl ServiceActivityBuilder {
    pub fn new(unique_id: impl Into<String>, parent_id: &str) -> Self {
        Self {
            activity: ServiceActivity {
                unique_id: unique_id.into(),
                parent_id: parent_id.into(),
                ..Default::default()
            },
        }
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.activity.class_name = Some(class_name.into());
        self
    }

    /// Record one process step.
    pub fn step(mut self, message_id: impl Into<String>, ms_taken: u64) -> Self {
        self.activity.stats.record(message_id, ms_taken);
        self
    }

    /// Add a nested service built using a closure.
    pub fn service<F>(mut self, unique_id: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(ServiceActivityBuilder) -> ServiceActivityBuilder,
    {
        let builder = ServiceActivityBuilder::new(unique_id, &self.activity.unique_id);
        let service = f(builder).build();
        self.activity
            .services
            .insert(service.unique_id.clone(), service);
        self
    }

    pub fn build(self) -> ServiceActivity {
        self.activity
    }
}

/// Builder for `EndpointActivity`.
#[derive(Debug)]
pub struct EndpointActivityBuilder {
    activity: EndpointActivity,
}

impl EndpointActivityBuilder {
    pub fn new(unique_id: impl Into<String>, parent_id: &str) -> Self {
        Self {
            activity: EndpointActivity {
                unique_id: unique_id.into(),
                parent_id: parent_id.into(),
                ..Default::default()
            },
        }
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.activity.class_name = Some(class_name.into());
        self
    }

    pub fn vendor_impl(mut self, vendor_impl: impl Into<String>) -> Self {
        self.activity.vendor_impl = Some(vendor_impl.into());
        self
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.activity.destination = Some(destination.into());
        self
    }

    /// Record one process step.
    pub fn step(mut self, message_id: impl Into<String>, ms_taken: u64) -> Self {
        self.activity.stats.record(message_id, ms_taken);
        self
    }

    pub fn build(self) -> EndpointActivity {
        self.activity
    }
}
