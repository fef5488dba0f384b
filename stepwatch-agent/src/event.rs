//! Process-step events emitted by the monitored platform.

use std::fmt;
use std::sync::Arc;

use crate::error::IngestError;

/// Kind of a monitored component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Adapter,
    Channel,
    Workflow,
    Service,
    /// A container of services with no statistics of its own.
    ServiceList,
    Producer,
    Consumer,
}

impl ComponentKind {
    /// How many parent hops separate a component of this kind from its adapter.
    ///
    /// `None` for service lists, whose steps are not aggregated.
    pub fn adapter_hops(self) -> Option<usize> {
        match self {
            ComponentKind::Adapter => Some(0),
            ComponentKind::Channel => Some(1),
            ComponentKind::Workflow => Some(2),
            ComponentKind::Service | ComponentKind::Producer | ComponentKind::Consumer => Some(3),
            ComponentKind::ServiceList => None,
        }
    }

    /// Whether a component of this kind can sit in a service slot.
    pub fn is_service(self) -> bool {
        matches!(self, ComponentKind::Service | ComponentKind::ServiceList)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::Adapter => "adapter",
            ComponentKind::Channel => "channel",
            ComponentKind::Workflow => "workflow",
            ComponentKind::Service => "service",
            ComponentKind::ServiceList => "service-list",
            ComponentKind::Producer => "producer",
            ComponentKind::Consumer => "consumer",
        };
        f.write_str(name)
    }
}

/// Identity of the component that performed a process step.
///
/// Components link to their structural parent, so the adapter, channel and
/// workflow owning a step can be reached by walking up the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepComponent {
    kind: ComponentKind,
    unique_id: String,
    class_name: Option<String>,
    vendor_impl: Option<String>,
    destination: Option<String>,
    parent: Option<Arc<StepComponent>>,
}

impl StepComponent {
    /// Create a component with no parent.
    pub fn new(kind: ComponentKind, unique_id: impl Into<String>) -> Self {
        Self {
            kind,
            unique_id: unique_id.into(),
            class_name: None,
            vendor_impl: None,
            destination: None,
            parent: None,
        }
    }

    /// Create a component owned by `parent`.
    pub fn child_of(
        parent: &Arc<StepComponent>,
        kind: ComponentKind,
        unique_id: impl Into<String>,
    ) -> Self {
        Self {
            parent: Some(parent.clone()),
            ..Self::new(kind, unique_id)
        }
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_vendor_impl(mut self, vendor_impl: impl Into<String>) -> Self {
        self.vendor_impl = Some(vendor_impl.into());
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn vendor_impl(&self) -> Option<&str> {
        self.vendor_impl.as_deref()
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn parent(&self) -> Option<&Arc<StepComponent>> {
        self.parent.as_ref()
    }

    /// This component followed by `hops` ancestors, nearest first.
    pub fn lineage(&self, hops: usize) -> Result<Vec<&StepComponent>, IngestError> {
        let mut lineage = Vec::with_capacity(hops + 1);
        let mut current = self;
        lineage.push(current);
        for _ in 0..hops {
            current = current
                .parent
                .as_deref()
                .ok_or_else(|| IngestError::MissingAncestor {
                    kind: self.kind,
                    unique_id: self.unique_id.clone(),
                    hops,
                })?;
            lineage.push(current);
        }
        Ok(lineage)
    }
}

/// A single timed unit of work performed by one component for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStep {
    component: Arc<StepComponent>,
    message_id: String,
    time_taken_ms: u64,
    step_name: Option<String>,
}

impl ProcessStep {
    pub fn new(
        component: Arc<StepComponent>,
        message_id: impl Into<String>,
        time_taken_ms: u64,
    ) -> Self {
        Self {
            component,
            message_id: message_id.into(),
            time_taken_ms,
            step_name: None,
        }
    }

    /// Attach a human-readable label for the step.
    pub fn with_step_name(mut self, step_name: impl Into<String>) -> Self {
        self.step_name = Some(step_name.into());
        self
    }

    pub fn component(&self) -> &StepComponent {
        &self.component
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn time_taken_ms(&self) -> u64 {
        self.time_taken_ms
    }

    pub fn step_name(&self) -> Option<&str> {
        self.step_name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_component() -> StepComponent {
        let adapter = Arc::new(StepComponent::new(ComponentKind::Adapter, "A"));
        let channel = Arc::new(StepComponent::child_of(&adapter, ComponentKind::Channel, "C"));
        let workflow = Arc::new(StepComponent::child_of(&channel, ComponentKind::Workflow, "W"));
        StepComponent::child_of(&workflow, ComponentKind::Service, "S")
    }

    #[test]
    fn hops_by_kind() {
        assert_eq!(ComponentKind::Adapter.adapter_hops(), Some(0));
        assert_eq!(ComponentKind::Channel.adapter_hops(), Some(1));
        assert_eq!(ComponentKind::Workflow.adapter_hops(), Some(2));
        assert_eq!(ComponentKind::Service.adapter_hops(), Some(3));
        assert_eq!(ComponentKind::Producer.adapter_hops(), Some(3));
        assert_eq!(ComponentKind::Consumer.adapter_hops(), Some(3));
        assert_eq!(ComponentKind::ServiceList.adapter_hops(), None);
    }

    #[test]
    fn lineage_walks_nearest_first() {
        let service = service_component();
        let ids: Vec<&str> = service
            .lineage(3)
            .unwrap()
            .iter()
            .map(|c| c.unique_id())
            .collect();

        assert_eq!(ids, vec!["S", "W", "C", "A"]);
    }

    #[test]
    fn lineage_reports_short_chains() {
        let orphan = StepComponent::new(ComponentKind::Producer, "P");
        let err = orphan.lineage(3).unwrap_err();

        assert_eq!(
            err,
            IngestError::MissingAncestor {
                kind: ComponentKind::Producer,
                unique_id: "P".to_string(),
                hops: 3,
            }
        );
    }

    #[test]
    fn zero_hops_is_just_the_component() {
        let adapter = StepComponent::new(ComponentKind::Adapter, "A");
        assert_eq!(adapter.lineage(0).unwrap().len(), 1);
    }
}
