//! Bootstrapping the activity tree from a live component graph.
//!
//! Discovery runs once, before steady-state ingestion, and produces a tree
//! with every node in place but all statistics empty. Composite services are
//! expanded through [`LiveComponent::attributes`], to any depth.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{DiscoveryError, IntrospectionError};
use crate::event::ComponentKind;
use crate::node::{ActivityMap, AdapterNode, ChannelNode, EndpointNode, ServiceNode, WorkflowNode};

/// A component of the running platform, as seen at bootstrap.
///
/// Containers only override the accessors for what they contain; the
/// defaults describe a component with no children.
pub trait LiveComponent {
    fn kind(&self) -> ComponentKind;

    fn unique_id(&self) -> &str;

    /// Implementation label of the component.
    fn class_name(&self) -> &str;

    fn vendor_impl(&self) -> Option<&str> {
        None
    }

    fn destination(&self) -> Option<&str> {
        None
    }

    /// Channels of an adapter, in configured order.
    fn channels(&self) -> Vec<&dyn LiveComponent> {
        Vec::new()
    }

    /// Workflows of a channel, in configured order.
    fn workflows(&self) -> Vec<&dyn LiveComponent> {
        Vec::new()
    }

    fn producer(&self) -> Option<&dyn LiveComponent> {
        None
    }

    fn consumer(&self) -> Option<&dyn LiveComponent> {
        None
    }

    /// Service sequence of a workflow, in execution order.
    fn services(&self) -> Vec<&dyn LiveComponent> {
        Vec::new()
    }

    /// Every readable attribute of the component.
    fn attributes(&self) -> Result<Vec<Attribute<'_>>, IntrospectionError> {
        Ok(Vec::new())
    }

    /// Whether the component can hold further services.
    fn is_composite(&self) -> bool {
        false
    }

    /// Services held directly by this component's attributes, in attribute order.
    fn nested_services(&self) -> Result<Vec<&dyn LiveComponent>, IntrospectionError> {
        let mut nested = Vec::new();
        for attribute in self.attributes()? {
            match attribute.value {
                AttributeValue::Service(service) => nested.push(service),
                AttributeValue::ServiceList(services) => nested.extend(services),
                AttributeValue::Other => {}
            }
        }
        Ok(nested)
    }
}

/// A named attribute of a live component.
pub struct Attribute<'a> {
    pub name: &'a str,
    pub value: AttributeValue<'a>,
}

impl<'a> Attribute<'a> {
    pub fn new(name: &'a str, value: AttributeValue<'a>) -> Self {
        Self { name, value }
    }
}

/// The value of an attribute, as far as discovery cares.
pub enum AttributeValue<'a> {
    /// A single service.
    Service(&'a dyn LiveComponent),
    /// An ordered collection whose elements are all services.
    ServiceList(Vec<&'a dyn LiveComponent>),
    /// Anything else.
    Other,
}

/// A nested subtree that discovery had to give up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbandonedSubtree {
    pub unique_id: String,
    pub reason: String,
}

/// Integrity findings of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Ids seen more than once, one entry per repeat occurrence.
    pub collisions: Vec<String>,
    /// Services whose nested services could not be enumerated.
    pub abandoned: Vec<AbandonedSubtree>,
    /// Services found nested inside themselves; not expanded again.
    ///
    /// A different component that merely shares an ancestor's id is a
    /// collision, not a cycle.
    pub cycles: Vec<String>,
    /// Number of nodes created.
    pub nodes: usize,
}

impl DiscoveryReport {
    pub fn is_clean(&self) -> bool {
        self.collisions.is_empty() && self.abandoned.is_empty() && self.cycles.is_empty()
    }
}

/// Builds the initial activity tree from a live adapter.
#[derive(Debug, Default)]
pub struct TopologyDiscoverer {
    seen: HashSet<String>,
    report: DiscoveryReport,
}

struct NestedFrame<'a> {
    node: Arc<ServiceNode>,
    component: &'a dyn LiveComponent,
    /// Addresses of the components from the top-level service down to this one.
    lineage: Vec<*const ()>,
}

/// Address of the component object, ignoring the vtable.
fn identity(component: &dyn LiveComponent) -> *const () {
    component as *const _ as *const ()
}

impl TopologyDiscoverer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Findings of the most recent pass.
    pub fn report(&self) -> &DiscoveryReport {
        &self.report
    }

    /// Walk `root` and build its activity tree.
    ///
    /// Fails only when `root` is not an adapter. Id collisions and failed
    /// introspection are logged, recorded in [`report`](Self::report) and
    /// otherwise tolerated.
    pub fn discover(&mut self, root: &dyn LiveComponent) -> Result<ActivityMap, DiscoveryError> {
        self.seen.clear();
        self.report = DiscoveryReport::default();

        if root.kind() != ComponentKind::Adapter {
            return Err(DiscoveryError::NotAnAdapter {
                kind: root.kind(),
                unique_id: root.unique_id().to_string(),
            });
        }

        let map = ActivityMap::new();
        self.track(root);
        let adapter = map.add_adapter(AdapterNode::new(root.unique_id()));

        for channel in root.channels() {
            self.track(channel);
            let channel_node =
                adapter.add_channel(ChannelNode::new(channel.unique_id(), adapter.unique_id()));

            for workflow in channel.workflows() {
                self.track(workflow);
                let workflow_node = channel_node
                    .add_workflow(WorkflowNode::new(workflow.unique_id(), channel_node.unique_id()));
                self.discover_workflow(&workflow_node, workflow);
            }
        }

        info!(
            adapter = root.unique_id(),
            nodes = self.report.nodes,
            collisions = self.report.collisions.len(),
            abandoned = self.report.abandoned.len(),
            "Discovered topology"
        );

        Ok(map)
    }

    fn discover_workflow(&mut self, node: &WorkflowNode, workflow: &dyn LiveComponent) {
        if let Some(producer) = workflow.producer() {
            self.track(producer);
            node.set_producer(self.endpoint(producer, node.unique_id()));
        }
        if let Some(consumer) = workflow.consumer() {
            self.track(consumer);
            node.set_consumer(self.endpoint(consumer, node.unique_id()));
        }

        for service in workflow.services() {
            self.track(service);
            let service_node = node.add_service(
                ServiceNode::new(service.unique_id(), node.unique_id())
                    .with_class_name(service.class_name()),
            );
            self.discover_nested(service_node, service);
        }
    }

    fn endpoint(&self, component: &dyn LiveComponent, workflow_id: &str) -> EndpointNode {
        let endpoint = EndpointNode::new(component.unique_id(), workflow_id);
        endpoint.set_class_name(component.class_name());
        if let Some(vendor_impl) = component.vendor_impl() {
            endpoint.set_vendor_impl(vendor_impl);
        }
        if let Some(destination) = component.destination() {
            endpoint.set_destination(destination);
        }
        endpoint
    }

    /// Expand the services nested inside `service`, depth first.
    ///
    /// Uses an explicit stack so arbitrarily deep composites cannot overflow
    /// the thread stack.
    fn discover_nested<'a>(&mut self, node: Arc<ServiceNode>, service: &'a dyn LiveComponent) {
        let mut stack = vec![NestedFrame {
            node,
            component: service,
            lineage: vec![identity(service)],
        }];

        while let Some(frame) = stack.pop() {
            let children = match frame.component.nested_services() {
                Ok(children) => children,
                Err(err) => {
                    error!(
                        unique_id = frame.component.unique_id(),
                        error = %err,
                        "Traversing service failed, abandoning its nested services"
                    );
                    self.report.abandoned.push(AbandonedSubtree {
                        unique_id: frame.component.unique_id().to_string(),
                        reason: err.reason,
                    });
                    continue;
                }
            };

            for child in children {
                let child_id = child.unique_id();
                if !child.kind().is_service() {
                    debug!(
                        unique_id = child_id,
                        kind = %child.kind(),
                        "Ignoring non-service attribute value"
                    );
                    continue;
                }
                if frame.lineage.contains(&identity(child)) {
                    warn!(unique_id = child_id, "Service is nested inside itself, not expanding");
                    self.report.cycles.push(child_id.to_string());
                    continue;
                }

                self.track(child);
                let child_node = frame.node.add_service(
                    ServiceNode::new(child_id, frame.node.unique_id())
                        .with_class_name(child.class_name()),
                );

                if child.is_composite() {
                    let mut lineage = frame.lineage.clone();
                    lineage.push(identity(child));
                    stack.push(NestedFrame {
                        node: child_node,
                        component: child,
                        lineage,
                    });
                }
            }
        }
    }

    /// Record that a node was created for `component`, warning on repeated ids.
    fn track(&mut self, component: &dyn LiveComponent) {
        self.report.nodes += 1;
        let unique_id = component.unique_id();
        if !self.seen.insert(unique_id.to_string()) {
            warn!(
                unique_id,
                kind = %component.kind(),
                "Component unique id collision; monitoring data for this id may be unreliable"
            );
            self.report.collisions.push(unique_id.to_string());
        }
    }
}
