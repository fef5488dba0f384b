//! The main Agent type for aggregating and emitting activity.

use std::sync::Arc;
use std::time::Duration;

use stepwatch_types::ActivitySnapshot;

use crate::discover::{DiscoveryReport, LiveComponent, TopologyDiscoverer};
use crate::error::DiscoveryError;
use crate::event::ProcessStep;
use crate::handle::AgentHandle;
use crate::node::ActivityMap;
use crate::output::Output;

/// The main entry point for monitoring a running adapter.
///
/// An Agent owns the live activity tree, folds reported process steps into
/// it, and periodically emits snapshots to configured outputs.
///
/// # Example
///
/// ```rust,no_run
/// use stepwatch_agent::{Agent, Output};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let agent = Agent::builder()
///         .output(Output::tcp("localhost:7450"))
///         .interval(Duration::from_secs(5))
///         .build();
///
///     let handle = agent.handle();
///
///     // Start background emission
///     let emission = agent.start();
///
///     // ... hand `handle` to the platform and let it report steps ...
///
///     tokio::time::sleep(Duration::from_secs(30)).await;
///     emission.stop();
/// }
/// ```
#[derive(Debug)]
pub struct Agent {
    map: Arc<ActivityMap>,
    outputs: Arc<Vec<Output>>,
    interval: Duration,
    discovery: Option<DiscoveryReport>,
}

impl Agent {
    /// Create a new agent with default settings.
    ///
    /// By default the tree is empty, no outputs are configured and the
    /// interval is 1 second.
    pub fn new() -> Self {
        Self {
            map: Arc::new(ActivityMap::new()),
            outputs: Arc::new(Vec::new()),
            interval: Duration::from_secs(1),
            discovery: None,
        }
    }

    /// Create a builder for configuring the agent.
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Get a handle for reporting process steps.
    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            map: self.map.clone(),
        }
    }

    /// Fold one process step into the tree.
    pub fn ingest(&self, step: &ProcessStep) {
        self.map.ingest(step);
    }

    /// The live activity tree.
    pub fn activity_map(&self) -> &ActivityMap {
        &self.map
    }

    /// Findings of the discovery pass this agent was built from, if any.
    pub fn discovery_report(&self) -> Option<&DiscoveryReport> {
        self.discovery.as_ref()
    }

    /// Collect a snapshot of all current activity.
    pub fn collect(&self) -> ActivitySnapshot {
        self.map.collect()
    }

    /// Start background emission of snapshots.
    ///
    /// This spawns a tokio task that periodically collects and emits
    /// snapshots to all configured outputs. Failed emissions are logged and
    /// retried on the next tick.
    ///
    /// Returns a handle that can be used to stop the emission.
    #[cfg(feature = "tokio")]
    pub fn start(&self) -> EmissionHandle {
        use tokio::sync::watch;

        let (stop_tx, stop_rx) = watch::channel(false);
        let map = self.map.clone();
        let outputs = self.outputs.clone();
        let interval = self.interval;

        tracing::info!(
            outputs = outputs.len(),
            interval_ms = interval.as_millis() as u64,
            "Starting snapshot emission"
        );

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            let mut stop_rx = stop_rx;

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let snapshot = map.collect();
                        emit_all(&outputs, &snapshot).await;
                    }
                    changed = stop_rx.changed() => {
                        // A dropped handle stops emission too
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("Snapshot emission stopped");
        });

        EmissionHandle { stop_tx }
    }

    /// Emit a snapshot to all outputs immediately.
    #[cfg(feature = "tokio")]
    pub async fn emit_now(&self) {
        let snapshot = self.map.collect();
        emit_all(&self.outputs, &snapshot).await;
    }
}

#[cfg(feature = "tokio")]
async fn emit_all(outputs: &[Output], snapshot: &ActivitySnapshot) {
    for output in outputs {
        if let Err(err) = output.emit(snapshot).await {
            tracing::warn!(
                output = %output.describe(),
                error = %err,
                "Failed to emit snapshot"
            );
        }
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for configuring an Agent.
#[derive(Debug, Default)]
pub struct AgentBuilder {
    outputs: Vec<Output>,
    interval: Option<Duration>,
    map: Option<ActivityMap>,
    discovery: Option<DiscoveryReport>,
}

impl AgentBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output destination.
    ///
    /// Multiple outputs can be added; snapshots will be emitted to all of them.
    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    /// Set the emission interval.
    ///
    /// Defaults to 1 second if not specified.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Seed the tree by discovering the topology under `root`.
    ///
    /// Fails if `root` is not an adapter.
    pub fn topology(mut self, root: &dyn LiveComponent) -> Result<Self, DiscoveryError> {
        let mut discoverer = TopologyDiscoverer::new();
        self.map = Some(discoverer.discover(root)?);
        self.discovery = Some(discoverer.report().clone());
        Ok(self)
    }

    /// Start from an existing tree.
    pub fn activity_map(mut self, map: ActivityMap) -> Self {
        self.map = Some(map);
        self.discovery = None;
        self
    }

    /// Build the agent.
    pub fn build(self) -> Agent {
        Agent {
            map: Arc::new(self.map.unwrap_or_default()),
            outputs: Arc::new(self.outputs),
            interval: self.interval.unwrap_or(Duration::from_secs(1)),
            discovery: self.discovery,
        }
    }
}

/// Handle for controlling background emission.
///
/// Drop this handle to stop emission, or call `stop()` explicitly.
#[cfg(feature = "tokio")]
pub struct EmissionHandle {
    stop_tx: tokio::sync::watch::Sender<bool>,
}

#[cfg(feature = "tokio")]
impl EmissionHandle {
    /// Stop background emission.
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }
}
