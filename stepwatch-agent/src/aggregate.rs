//! Folding process steps into the activity tree.

use std::sync::atomic::Ordering;

use tracing::{trace, warn};

use crate::error::IngestError;
use crate::event::{ComponentKind, ProcessStep, StepComponent};
use crate::node::{ActivityMap, EndpointNode};

impl ActivityMap {
    /// Fold one process step into the tree.
    ///
    /// Steps whose ancestor chain cannot be walked are logged and skipped;
    /// they never abort ingestion of later steps and never leave a partial
    /// update behind.
    pub fn ingest(&self, step: &ProcessStep) {
        if let Err(err) = self.try_ingest(step) {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            warn!(
                message_id = step.message_id(),
                error = %err,
                "Skipping process step"
            );
        }
    }

    /// Fold one process step into the tree, reporting malformed steps.
    ///
    /// Every step resolves its adapter, creating it on first sight. Only
    /// service, producer and consumer steps go further: they create any
    /// missing channel and workflow, add their message id to the workflow
    /// and update their own statistics. Adapter, channel and workflow steps
    /// carry no statistics of their own. Services are always attached
    /// directly under their workflow, whatever nesting discovery found.
    pub fn try_ingest(&self, step: &ProcessStep) -> Result<(), IngestError> {
        let component = step.component();
        let Some(hops) = component.kind().adapter_hops() else {
            trace!(unique_id = component.unique_id(), "Ignoring service-list step");
            return Ok(());
        };

        // Walk the whole chain before touching the tree
        let lineage = component.lineage(hops)?;

        let _gate = self.gate.read();

        let adapter = self.get_or_create_adapter(lineage[hops].unique_id());
        if hops < 3 {
            return Ok(());
        }
        let channel = adapter.get_or_create_channel(lineage[2].unique_id());
        let workflow = channel.get_or_create_workflow(lineage[1].unique_id());
        workflow.record_message_id(step.message_id());

        match component.kind() {
            ComponentKind::Service => {
                let service = workflow.get_or_create_service(component.unique_id());
                service.record(step.message_id(), step.time_taken_ms());
                if let Some(label) = step.step_name().or(component.class_name()) {
                    service.set_class_name(label);
                }
            }
            ComponentKind::Producer => {
                let producer = workflow
                    .producer_or_insert_with(|| endpoint_for(component, workflow.unique_id()));
                producer.record(step.message_id(), step.time_taken_ms());
            }
            ComponentKind::Consumer => {
                let consumer = workflow
                    .consumer_or_insert_with(|| endpoint_for(component, workflow.unique_id()));
                consumer.record(step.message_id(), step.time_taken_ms());
            }
            ComponentKind::Adapter
            | ComponentKind::Channel
            | ComponentKind::Workflow
            | ComponentKind::ServiceList => {}
        }

        Ok(())
    }
}

/// A producer or consumer node labelled from the component that first reported it.
fn endpoint_for(component: &StepComponent, workflow_id: &str) -> EndpointNode {
    let endpoint = EndpointNode::new(component.unique_id(), workflow_id);
    if let Some(class_name) = component.class_name() {
        endpoint.set_class_name(class_name);
    }
    if let Some(vendor_impl) = component.vendor_impl() {
        endpoint.set_vendor_impl(vendor_impl);
    }
    if let Some(destination) = component.destination() {
        endpoint.set_destination(destination);
    }
    endpoint
}
