//! Live activity tree: one node per monitored component.
//!
//! Parent maps are guarded by their own `RwLock` and expose an atomic
//! get-or-create, so two concurrent first sightings of a component always
//! resolve to the same node. Statistics sit behind a per-node `Mutex` so a
//! step's count, latency and mean are updated together.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use stepwatch_types::{
    ActivitySnapshot, AdapterActivity, ChannelActivity, EndpointActivity, ServiceActivity,
    StepStats, WorkflowActivity,
};

type NodeMap<T> = RwLock<BTreeMap<String, Arc<T>>>;

fn get_or_insert_with<T>(map: &NodeMap<T>, unique_id: &str, make: impl FnOnce() -> T) -> Arc<T> {
    // Fast path: check if it exists
    {
        let nodes = map.read();
        if let Some(node) = nodes.get(unique_id) {
            return node.clone();
        }
    }

    // Slow path: entry() re-checks under the write lock
    let mut nodes = map.write();
    nodes
        .entry(unique_id.to_string())
        .or_insert_with(|| Arc::new(make()))
        .clone()
}

fn insert<T>(map: &NodeMap<T>, unique_id: &str, node: T) -> Arc<T> {
    let node = Arc::new(node);
    map.write().insert(unique_id.to_string(), node.clone());
    node
}

/// The root of the activity tree: every adapter seen by this agent.
#[derive(Debug, Default)]
pub struct ActivityMap {
    adapters: NodeMap<AdapterNode>,
    /// Held shared while a step is folded in and exclusively while collecting.
    pub(crate) gate: RwLock<()>,
    pub(crate) skipped: AtomicU64,
}

impl ActivityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the adapter node with this id.
    pub fn get_or_create_adapter(&self, unique_id: &str) -> Arc<AdapterNode> {
        get_or_insert_with(&self.adapters, unique_id, || AdapterNode::new(unique_id))
    }

    /// Attach an adapter, replacing any adapter with the same id.
    pub fn add_adapter(&self, adapter: AdapterNode) -> Arc<AdapterNode> {
        let unique_id = adapter.unique_id.clone();
        insert(&self.adapters, &unique_id, adapter)
    }

    pub fn adapter(&self, unique_id: &str) -> Option<Arc<AdapterNode>> {
        self.adapters.read().get(unique_id).cloned()
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.read().len()
    }

    /// Number of steps dropped because their ancestor chain was malformed.
    pub fn skipped_steps(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Take a consistent point-in-time copy of the whole tree.
    ///
    /// Blocks ingestion for the duration of the copy.
    pub fn collect(&self) -> ActivitySnapshot {
        let _gate = self.gate.write();
        let adapters = self.adapters.read();

        let mut snapshot = ActivitySnapshot::builder();
        for adapter in adapters.values() {
            snapshot = snapshot.adapter_activity(adapter.collect());
        }
        snapshot.build()
    }
}

/// An adapter and its channels.
#[derive(Debug)]
pub struct AdapterNode {
    unique_id: String,
    channels: NodeMap<ChannelNode>,
}

impl AdapterNode {
    pub fn new(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            channels: RwLock::default(),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn get_or_create_channel(&self, unique_id: &str) -> Arc<ChannelNode> {
        get_or_insert_with(&self.channels, unique_id, || {
            ChannelNode::new(unique_id, &self.unique_id)
        })
    }

    /// Attach a channel, replacing any channel with the same id.
    pub fn add_channel(&self, channel: ChannelNode) -> Arc<ChannelNode> {
        let unique_id = channel.unique_id.clone();
        insert(&self.channels, &unique_id, channel)
    }

    pub fn channel(&self, unique_id: &str) -> Option<Arc<ChannelNode>> {
        self.channels.read().get(unique_id).cloned()
    }

    pub fn collect(&self) -> AdapterActivity {
        AdapterActivity {
            unique_id: self.unique_id.clone(),
            channels: self
                .channels
                .read()
                .iter()
                .map(|(id, channel)| (id.clone(), channel.collect()))
                .collect(),
        }
    }
}

/// A channel and its workflows.
#[derive(Debug)]
pub struct ChannelNode {
    unique_id: String,
    parent_id: String,
    workflows: NodeMap<WorkflowNode>,
}

impl ChannelNode {
    pub fn new(unique_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            parent_id: parent_id.into(),
            workflows: RwLock::default(),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn get_or_create_workflow(&self, unique_id: &str) -> Arc<WorkflowNode> {
        get_or_insert_with(&self.workflows, unique_id, || {
            WorkflowNode::new(unique_id, &self.unique_id)
        })
    }

    /// Attach a workflow, replacing any workflow with the same id.
    pub fn add_workflow(&self, workflow: WorkflowNode) -> Arc<WorkflowNode> {
        let unique_id = workflow.unique_id.clone();
        insert(&self.workflows, &unique_id, workflow)
    }

    pub fn workflow(&self, unique_id: &str) -> Option<Arc<WorkflowNode>> {
        self.workflows.read().get(unique_id).cloned()
    }

    pub fn collect(&self) -> ChannelActivity {
        ChannelActivity {
            unique_id: self.unique_id.clone(),
            parent_id: self.parent_id.clone(),
            workflows: self
                .workflows
                .read()
                .iter()
                .map(|(id, workflow)| (id.clone(), workflow.collect()))
                .collect(),
        }
    }
}

/// A workflow: its services, its producer and consumer, and every message it has seen.
#[derive(Debug)]
pub struct WorkflowNode {
    unique_id: String,
    parent_id: String,
    message_ids: RwLock<BTreeSet<String>>,
    services: NodeMap<ServiceNode>,
    producer: RwLock<Option<Arc<EndpointNode>>>,
    consumer: RwLock<Option<Arc<EndpointNode>>>,
}

impl WorkflowNode {
    pub fn new(unique_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            parent_id: parent_id.into(),
            message_ids: RwLock::default(),
            services: RwLock::default(),
            producer: RwLock::default(),
            consumer: RwLock::default(),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    /// Mark a message as seen. Returns `false` if it was already known.
    pub fn record_message_id(&self, message_id: &str) -> bool {
        if self.message_ids.read().contains(message_id) {
            return false;
        }
        self.message_ids.write().insert(message_id.to_string())
    }

    pub fn message_count(&self) -> usize {
        self.message_ids.read().len()
    }

    pub fn get_or_create_service(&self, unique_id: &str) -> Arc<ServiceNode> {
        get_or_insert_with(&self.services, unique_id, || {
            ServiceNode::new(unique_id, &self.unique_id)
        })
    }

    /// Attach a top-level service, replacing any service with the same id.
    pub fn add_service(&self, service: ServiceNode) -> Arc<ServiceNode> {
        let unique_id = service.unique_id.clone();
        insert(&self.services, &unique_id, service)
    }

    pub fn service(&self, unique_id: &str) -> Option<Arc<ServiceNode>> {
        self.services.read().get(unique_id).cloned()
    }

    pub fn producer(&self) -> Option<Arc<EndpointNode>> {
        self.producer.read().clone()
    }

    pub fn set_producer(&self, producer: EndpointNode) -> Arc<EndpointNode> {
        let producer = Arc::new(producer);
        *self.producer.write() = Some(producer.clone());
        producer
    }

    /// The producer, created with `make` if the workflow has none yet.
    pub fn producer_or_insert_with(&self, make: impl FnOnce() -> EndpointNode) -> Arc<EndpointNode> {
        endpoint_or_insert_with(&self.producer, make)
    }

    pub fn consumer(&self) -> Option<Arc<EndpointNode>> {
        self.consumer.read().clone()
    }

    pub fn set_consumer(&self, consumer: EndpointNode) -> Arc<EndpointNode> {
        let consumer = Arc::new(consumer);
        *self.consumer.write() = Some(consumer.clone());
        consumer
    }

    /// The consumer, created with `make` if the workflow has none yet.
    pub fn consumer_or_insert_with(&self, make: impl FnOnce() -> EndpointNode) -> Arc<EndpointNode> {
        endpoint_or_insert_with(&self.consumer, make)
    }

    pub fn collect(&self) -> WorkflowActivity {
        WorkflowActivity {
            unique_id: self.unique_id.clone(),
            parent_id: self.parent_id.clone(),
            message_ids: self.message_ids.read().clone(),
            producer: self.producer().map(|p| p.collect()),
            consumer: self.consumer().map(|c| c.collect()),
            services: self
                .services
                .read()
                .iter()
                .map(|(id, service)| (id.clone(), service.collect()))
                .collect(),
        }
    }
}

fn endpoint_or_insert_with(
    slot: &RwLock<Option<Arc<EndpointNode>>>,
    make: impl FnOnce() -> EndpointNode,
) -> Arc<EndpointNode> {
    if let Some(endpoint) = slot.read().as_ref() {
        return endpoint.clone();
    }
    slot.write().get_or_insert_with(|| Arc::new(make())).clone()
}

/// A service, with any services nested inside it.
#[derive(Debug)]
pub struct ServiceNode {
    unique_id: String,
    parent_id: String,
    class_name: RwLock<Option<String>>,
    stats: Mutex<StepStats>,
    services: NodeMap<ServiceNode>,
}

impl ServiceNode {
    pub fn new(unique_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            parent_id: parent_id.into(),
            class_name: RwLock::default(),
            stats: Mutex::default(),
            services: RwLock::default(),
        }
    }

    pub fn with_class_name(self, class_name: impl Into<String>) -> Self {
        *self.class_name.write() = Some(class_name.into());
        self
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn class_name(&self) -> Option<String> {
        self.class_name.read().clone()
    }

    pub fn set_class_name(&self, class_name: impl Into<String>) {
        *self.class_name.write() = Some(class_name.into());
    }

    /// Fold one step into this service's statistics.
    pub fn record(&self, message_id: &str, ms_taken: u64) {
        self.stats.lock().record(message_id, ms_taken);
    }

    pub fn stats(&self) -> StepStats {
        self.stats.lock().clone()
    }

    /// Attach a nested service, replacing any nested service with the same id.
    pub fn add_service(&self, service: ServiceNode) -> Arc<ServiceNode> {
        let unique_id = service.unique_id.clone();
        insert(&self.services, &unique_id, service)
    }

    pub fn service(&self, unique_id: &str) -> Option<Arc<ServiceNode>> {
        self.services.read().get(unique_id).cloned()
    }

    pub fn nested_count(&self) -> usize {
        self.services.read().len()
    }

    pub fn collect(&self) -> ServiceActivity {
        ServiceActivity {
            unique_id: self.unique_id.clone(),
            parent_id: self.parent_id.clone(),
            class_name: self.class_name(),
            stats: self.stats(),
            services: self
                .services
                .read()
                .iter()
                .map(|(id, service)| (id.clone(), service.collect()))
                .collect(),
        }
    }
}

/// Descriptive labels of a producer or consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EndpointLabels {
    class_name: Option<String>,
    vendor_impl: Option<String>,
    destination: Option<String>,
}

/// A workflow's producer or consumer.
#[derive(Debug)]
pub struct EndpointNode {
    unique_id: String,
    parent_id: String,
    labels: RwLock<EndpointLabels>,
    stats: Mutex<StepStats>,
}

impl EndpointNode {
    pub fn new(unique_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            parent_id: parent_id.into(),
            labels: RwLock::default(),
            stats: Mutex::default(),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn class_name(&self) -> Option<String> {
        self.labels.read().class_name.clone()
    }

    pub fn set_class_name(&self, class_name: impl Into<String>) {
        self.labels.write().class_name = Some(class_name.into());
    }

    pub fn vendor_impl(&self) -> Option<String> {
        self.labels.read().vendor_impl.clone()
    }

    pub fn set_vendor_impl(&self, vendor_impl: impl Into<String>) {
        self.labels.write().vendor_impl = Some(vendor_impl.into());
    }

    pub fn destination(&self) -> Option<String> {
        self.labels.read().destination.clone()
    }

    pub fn set_destination(&self, destination: impl Into<String>) {
        self.labels.write().destination = Some(destination.into());
    }

    /// Fold one step into this endpoint's statistics.
    pub fn record(&self, message_id: &str, ms_taken: u64) {
        self.stats.lock().record(message_id, ms_taken);
    }

    pub fn stats(&self) -> StepStats {
        self.stats.lock().clone()
    }

    pub fn collect(&self) -> EndpointActivity {
        let labels = self.labels.read().clone();
        EndpointActivity {
            unique_id: self.unique_id.clone(),
            parent_id: self.parent_id.clone(),
            class_name: labels.class_name,
            vendor_impl: labels.vendor_impl,
            destination: labels.destination,
            stats: self.stats(),
        }
    }
}
