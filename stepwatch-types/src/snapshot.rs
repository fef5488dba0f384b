//! ActivitySnapshot - a point-in-time copy of the activity tree.

use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::activity::find_service;
use crate::{
    AdapterActivity, AdapterActivityBuilder, ServiceActivity, WorkflowActivity, SCHEMA_VERSION,
};

/// Schema version embedded in every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct SchemaVersion {
    /// Bumped on breaking changes to the tree layout.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub major: u32,

    /// Bumped when optional fields are added.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub minor: u32,
}

impl SchemaVersion {
    pub const fn current() -> Self {
        Self {
            major: SCHEMA_VERSION,
            minor: 0,
        }
    }

    /// A snapshot is readable when its major version matches ours.
    pub fn is_compatible(&self) -> bool {
        self.major == SCHEMA_VERSION
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::current()
    }
}

/// A point-in-time snapshot of every monitored adapter.
///
/// Snapshots are produced by the agent at send time and consumed by relays
/// and forwarders. They are plain owned data; mutating one never affects the
/// live tree it was taken from.
///
/// # Example
///
/// ```rust
/// use stepwatch_types::ActivitySnapshot;
///
/// let snapshot = ActivitySnapshot::builder()
///     .adapter("adapter", |a| {
///         a.channel("channel", |c| {
///             c.workflow("workflow", |w| {
///                 w.message_id("m1")
///                     .service("log-payload", |s| s.class_name("LogMessageService").step("m1", 12))
///             })
///         })
///     })
///     .build();
///
/// assert_eq!(snapshot.service("log-payload").unwrap().stats.avg_ms_taken, 12);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct ActivitySnapshot {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub version: SchemaVersion,

    /// Unix timestamp in milliseconds when this snapshot was taken.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub timestamp_ms: u64,

    /// Adapters keyed by unique id.
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(2))]
    pub adapters: BTreeMap<String, AdapterActivity>,
}

impl ActivitySnapshot {
    /// Create an empty snapshot with the current timestamp.
    #[cfg(feature = "std")]
    pub fn new() -> Self {
        Self::with_timestamp(current_timestamp_ms())
    }

    pub fn with_timestamp(timestamp_ms: u64) -> Self {
        Self {
            version: SchemaVersion::current(),
            timestamp_ms,
            adapters: BTreeMap::new(),
        }
    }

    pub fn builder() -> ActivitySnapshotBuilder {
        ActivitySnapshotBuilder::new()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Number of adapters in the snapshot.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn adapter(&self, unique_id: &str) -> Option<&AdapterActivity> {
        self.adapters.get(unique_id)
    }

    /// Find a workflow under any adapter and channel.
    pub fn workflow(&self, unique_id: &str) -> Option<&WorkflowActivity> {
        self.adapters
            .values()
            .find_map(|adapter| adapter.workflow(unique_id))
    }

    /// Find a service at any depth under any workflow.
    pub fn service(&self, unique_id: &str) -> Option<&ServiceActivity> {
        self.workflows()
            .find_map(|workflow| find_service(&workflow.services, unique_id))
    }

    /// Iterate over every workflow in the snapshot.
    pub fn workflows(&self) -> impl Iterator<Item = &WorkflowActivity> {
        self.adapters
            .values()
            .flat_map(|adapter| adapter.channels.values())
            .flat_map(|channel| channel.workflows.values())
    }

    /// Number of distinct messages seen, summed over workflows.
    pub fn total_messages(&self) -> usize {
        self.workflows().map(|w| w.message_ids.len()).sum()
    }
}

#[cfg(feature = "std")]
impl Default for ActivitySnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing `ActivitySnapshot` instances.
#[derive(Debug, Default)]
pub struct ActivitySnapshotBuilder {
    timestamp_ms: Option<u64>,
    adapters: BTreeMap<String, AdapterActivity>,
}

impl ActivitySnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a specific timestamp (milliseconds since Unix epoch).
    pub fn timestamp_ms(mut self, ts: u64) -> Self {
        self.timestamp_ms = Some(ts);
        self
    }

    /// Add an adapter built using a closure.
    pub fn adapter<F>(mut self, unique_id: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(AdapterActivityBuilder) -> AdapterActivityBuilder,
    {
        let adapter = f(AdapterActivityBuilder::new(unique_id)).build();
        self.adapters.insert(adapter.unique_id.clone(), adapter);
        self
    }

    /// Add a pre-built adapter record.
    pub fn adapter_activity(mut self, adapter: AdapterActivity) -> Self {
        self.adapters.insert(adapter.unique_id.clone(), adapter);
        self
    }

    #[cfg(feature = "std")]
    pub fn build(self) -> ActivitySnapshot {
        ActivitySnapshot {
            version: SchemaVersion::current(),
            timestamp_ms: self.timestamp_ms.unwrap_or_else(current_timestamp_ms),
            adapters: self.adapters,
        }
    }

    #[cfg(not(feature = "std"))]
    pub fn build(self) -> ActivitySnapshot {
        ActivitySnapshot {
            version: SchemaVersion::current(),
            timestamp_ms: self.timestamp_ms.unwrap_or(0),
            adapters: self.adapters,
        }
    }
}

#[cfg(feature = "std")]
fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
