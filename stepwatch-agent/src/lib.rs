//! # stepwatch-agent
//!
//! Runtime activity monitoring for message-processing adapters.
//!
//! An adapter is a tree of channels, each channel runs workflows, and each
//! workflow moves messages from a producer through a sequence of services
//! to a consumer. This crate keeps a live mirror of that tree and folds
//! every reported process step (one component, one message, one duration)
//! into it, so per-component message counts and latencies can be read at
//! any time as a consistent snapshot.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use stepwatch_agent::{Agent, ComponentKind, Output, StepComponent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let agent = Agent::builder()
//!         .output(Output::tcp("localhost:7450"))
//!         .interval(Duration::from_secs(5))
//!         .build();
//!
//!     let adapter = Arc::new(StepComponent::new(ComponentKind::Adapter, "adapter"));
//!     let channel = Arc::new(StepComponent::child_of(&adapter, ComponentKind::Channel, "channel"));
//!     let workflow = Arc::new(StepComponent::child_of(&channel, ComponentKind::Workflow, "workflow"));
//!     let service = Arc::new(StepComponent::child_of(&workflow, ComponentKind::Service, "log"));
//!
//!     let handle = agent.handle();
//!     handle.record(service, "message-1", 12);
//!
//!     // Start background emission (non-blocking)
//!     let _emission = agent.start();
//!
//!     // ... the adapter runs ...
//! }
//! ```
//!
//! ## Bootstrapping from a live topology
//!
//! Implement [`LiveComponent`] for the platform's components and pass the
//! adapter to [`AgentBuilder::topology`]. Every node, including services
//! nested inside composite services, is then present in snapshots before
//! the first message flows.

mod agent;
mod aggregate;
mod discover;
mod error;
mod event;
mod handle;
mod node;
mod output;

pub use agent::{Agent, AgentBuilder};
pub use discover::{
    AbandonedSubtree, Attribute, AttributeValue, DiscoveryReport, LiveComponent,
    TopologyDiscoverer,
};
pub use error::{DiscoveryError, IngestError, IntrospectionError};
pub use event::{ComponentKind, ProcessStep, StepComponent};
pub use handle::{AgentHandle, StepGuard};
pub use node::{ActivityMap, AdapterNode, ChannelNode, EndpointNode, ServiceNode, WorkflowNode};
pub use output::Output;

#[cfg(feature = "tokio")]
pub use agent::EmissionHandle;

// Re-export types for convenience
pub use stepwatch_types::{
    ActivitySnapshot, AdapterActivity, ChannelActivity, EndpointActivity, ServiceActivity,
    StepStats, WorkflowActivity,
};
