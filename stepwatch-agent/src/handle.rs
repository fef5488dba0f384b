//! Handle for reporting process steps.

use std::sync::Arc;
use std::time::Instant;

use crate::event::{ProcessStep, StepComponent};
use crate::node::ActivityMap;

/// A cheap, cloneable handle for reporting process steps into an agent.
///
/// This is the interface the monitored platform holds on to. Obtain one
/// with [`Agent::handle`](crate::Agent::handle) and clone it freely across
/// threads and tasks.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use stepwatch_agent::{Agent, ComponentKind, StepComponent};
///
/// let agent = Agent::new();
/// let handle = agent.handle();
///
/// let adapter = Arc::new(StepComponent::new(ComponentKind::Adapter, "adapter"));
/// let channel = Arc::new(StepComponent::child_of(&adapter, ComponentKind::Channel, "channel"));
/// let workflow = Arc::new(StepComponent::child_of(&channel, ComponentKind::Workflow, "workflow"));
/// let service = Arc::new(StepComponent::child_of(&workflow, ComponentKind::Service, "log"));
///
/// let guard = handle.time_step(service, "message-1");
/// // ... process the message ...
/// drop(guard);
///
/// assert_eq!(agent.collect().total_messages(), 1);
/// ```
#[derive(Clone)]
pub struct AgentHandle {
    pub(crate) map: Arc<ActivityMap>,
}

impl AgentHandle {
    /// Report a step that has already been timed.
    pub fn ingest(&self, step: ProcessStep) {
        self.map.ingest(&step);
    }

    /// Report a step from its parts.
    pub fn record(&self, component: Arc<StepComponent>, message_id: &str, time_taken_ms: u64) {
        self.map
            .ingest(&ProcessStep::new(component, message_id, time_taken_ms));
    }

    /// Start timing a step.
    ///
    /// The step is reported with its elapsed wall time when the returned
    /// guard is dropped, unless the guard is cancelled first.
    pub fn time_step(&self, component: Arc<StepComponent>, message_id: &str) -> StepGuard {
        StepGuard {
            map: self.map.clone(),
            component,
            message_id: message_id.to_string(),
            step_name: None,
            started: Instant::now(),
            armed: true,
        }
    }
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("adapters", &self.map.adapter_count())
            .finish()
    }
}

/// Guard that reports a timed step when dropped.
pub struct StepGuard {
    map: Arc<ActivityMap>,
    component: Arc<StepComponent>,
    message_id: String,
    step_name: Option<String>,
    started: Instant,
    armed: bool,
}

impl StepGuard {
    /// Label the step when it is reported.
    pub fn step_name(mut self, step_name: impl Into<String>) -> Self {
        self.step_name = Some(step_name.into());
        self
    }

    /// Drop the guard without reporting anything.
    pub fn cancel(mut self) {
        self.armed = false;
    }
}

impl Drop for StepGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        let mut step = ProcessStep::new(
            self.component.clone(),
            std::mem::take(&mut self.message_id),
            elapsed_ms,
        );
        if let Some(step_name) = self.step_name.take() {
            step = step.with_step_name(step_name);
        }
        self.map.ingest(&step);
    }
}
